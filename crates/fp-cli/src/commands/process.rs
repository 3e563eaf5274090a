//! Implementation of the `fp process` command.
//!
//! Runs the full pipeline over every archive of the input directory, one
//! unit per archive, and writes cleaned events, intervals and completion
//! sessions per unit. A failing unit is reported and skipped; the others
//! are still written.

use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use fp_core::{CompletionSink, EventSink, IntervalSink, TracingObserver, UnitOutput};

use crate::Config;
use crate::archive::{JsonlArchiveDir, JsonlOutputDir};

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Directory of `*.jsonl` archives, one unit per file.
    pub input: PathBuf,

    /// Output directory. Defaults to `output_dir` from the configuration.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSummary {
    pub unit: String,
    pub events: usize,
    pub intervals: usize,
    pub completions: usize,
}

impl From<&UnitOutput> for UnitSummary {
    fn from(output: &UnitOutput) -> Self {
        Self {
            unit: output.name.clone(),
            events: output.events.len(),
            intervals: output.intervals.len(),
            completions: output.completions.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUnit {
    pub unit: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct ProcessSummary {
    pub processed: Vec<UnitSummary>,
    pub failed: Vec<FailedUnit>,
}

/// Writes all three files of a unit, or none of them.
fn write_output(sink: &JsonlOutputDir, output: &UnitOutput) -> Result<()> {
    let written = write_files(sink, output);
    if written.is_err() {
        sink.discard(&output.name);
    }
    written
}

fn write_files(sink: &JsonlOutputDir, output: &UnitOutput) -> Result<()> {
    sink.write_events(&output.name, &output.events)
        .context("failed to write events")?;
    sink.write_intervals(&output.name, &output.intervals)
        .context("failed to write intervals")?;
    sink.write_completions(&output.name, &output.completions)
        .context("failed to write completion sessions")?;
    Ok(())
}

pub fn run<W: Write>(writer: &mut W, args: &ProcessArgs, config: &Config) -> Result<ProcessSummary> {
    let out_dir = args.out.clone().unwrap_or_else(|| config.output_dir.clone());
    let source = JsonlArchiveDir::new(&args.input);
    let sink = JsonlOutputDir::new(&out_dir);

    let reports = config
        .pipeline()
        .process_source(&source, &TracingObserver)
        .with_context(|| format!("failed to list archives in {}", args.input.display()))?;

    let mut summary = ProcessSummary::default();
    for report in reports {
        // Pipeline failures were already reported by the observer.
        let error = match report.result {
            Ok(output) => match write_output(&sink, &output) {
                Ok(()) => {
                    summary.processed.push(UnitSummary::from(&output));
                    continue;
                }
                Err(err) => {
                    let error = format!("unit '{}': {err:#}", output.name);
                    tracing::error!(unit = %output.name, error = %error, "failed to write unit");
                    error
                }
            },
            Err(err) => err.to_string(),
        };
        summary.failed.push(FailedUnit {
            unit: report.unit,
            error,
        });
    }

    write!(writer, "{}", format_summary(&summary, &out_dir))?;
    Ok(summary)
}

pub fn format_summary(summary: &ProcessSummary, out_dir: &Path) -> String {
    let mut output = String::new();
    for unit in &summary.processed {
        let _ = writeln!(
            output,
            "{}: {} events, {} intervals, {} completion sessions",
            unit.unit, unit.events, unit.intervals, unit.completions
        );
    }
    for failed in &summary.failed {
        let _ = writeln!(output, "{}: FAILED: {}", failed.unit, failed.error);
    }
    let _ = writeln!(
        output,
        "Processed {} units, {} failed. Output: {}",
        summary.processed.len() + summary.failed.len(),
        summary.failed.len(),
        out_dir.display()
    );
    output
}
