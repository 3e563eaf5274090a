//! Inspect command: shows how many events survive each cleaning stage.

use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use fp_core::{EventSource, PipelineError, StageCounts, TracingObserver};

use crate::Config;
use crate::archive::JsonlArchiveDir;

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Directory of `*.jsonl` archives, one unit per file.
    pub input: PathBuf,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Cleaning statistics of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectEntry {
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<StageCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn inspect(source: &JsonlArchiveDir, config: &Config) -> Result<Vec<InspectEntry>> {
    let pipeline = config.pipeline();
    let units = source.units().context("failed to list archives")?;

    Ok(units
        .into_iter()
        .map(|unit| {
            let cleaned = source
                .read_unit(&unit)
                .map_err(|err| PipelineError::Source {
                    unit: unit.clone(),
                    source: err,
                })
                .and_then(|events| pipeline.clean(&unit, events, &TracingObserver));
            match cleaned {
                Ok((_, counts)) => InspectEntry {
                    unit,
                    stages: Some(counts),
                    error: None,
                },
                Err(err) => InspectEntry {
                    unit,
                    stages: None,
                    error: Some(err.to_string()),
                },
            }
        })
        .collect())
}

pub fn run<W: Write>(writer: &mut W, args: &InspectArgs, config: &Config) -> Result<()> {
    let source = JsonlArchiveDir::new(&args.input);
    let entries = inspect(&source, config)
        .with_context(|| format!("failed to inspect {}", args.input.display()))?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
    } else {
        write!(writer, "{}", format_entries(&entries))?;
    }
    Ok(())
}

pub fn format_entries(entries: &[InspectEntry]) -> String {
    if entries.is_empty() {
        return "No archives found.\n".to_string();
    }

    let mut output = String::new();
    for entry in entries {
        let _ = writeln!(output, "{}", entry.unit);
        if let Some(stages) = &entry.stages {
            for stage in stages.iter() {
                let _ = writeln!(output, "  {:>6}  {}", stage.count, stage.stage);
            }
        }
        if let Some(error) = &entry.error {
            let _ = writeln!(output, "  error: {error}");
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    use fp_core::Stage;
    use insta::assert_snapshot;

    const UNTIMED: &str = r#"{"session_id":"ide-1","kind":{"type":"activity"}}"#;
    const COPY: &str = r#"{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:01Z","kind":{"type":"command","command_id":"Edit.Copy"}}"#;
    const SAVE: &str = r#"{"session_id":"ide-1","triggered_at":"2016-08-19T19:00:02Z","kind":{"type":"command","command_id":"File.SaveAll"}}"#;

    fn counts(values: &[(Stage, usize)]) -> StageCounts {
        let mut counts = StageCounts::default();
        for (stage, count) in values {
            counts.push(stage.clone(), *count);
        }
        counts
    }

    #[test]
    fn stage_table_lists_every_stage() {
        let entries = vec![
            InspectEntry {
                unit: "dev-1".to_string(),
                stages: Some(counts(&[
                    (Stage::BeforeFilters, 1204),
                    (Stage::AfterFilter("command filter: Edit.Copy".to_string()), 1180),
                    (Stage::AfterDeduplication, 1177),
                    (Stage::AfterOrdering, 1177),
                ])),
                error: None,
            },
            InspectEntry {
                unit: "dev-2".to_string(),
                stages: None,
                error: Some("unit 'dev-2': unknown unit 'dev-2'".to_string()),
            },
        ];

        assert_snapshot!(format_entries(&entries), @r"
        dev-1
            1204  before applying any filter
            1180  after applying 'command filter: Edit.Copy'
            1177  after removing duplicates
            1177  after ordering
        dev-2
          error: unit 'dev-2': unknown unit 'dev-2'
        ");
    }

    #[test]
    fn empty_directory_says_so() {
        assert_snapshot!(format_entries(&[]), @"No archives found.");
    }

    #[test]
    fn inspect_counts_archived_events() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join("dev-1.jsonl"),
            format!("{UNTIMED}\n{COPY}\n{SAVE}\n{COPY}\n"),
        )
        .unwrap();
        let config = Config {
            ignored_commands: vec!["File.SaveAll".to_string()],
            ..Config::default()
        };

        let entries = inspect(&JsonlArchiveDir::new(temp.path()), &config).unwrap();

        assert_eq!(entries.len(), 1);
        let stages = entries[0].stages.as_ref().unwrap();
        let counts: Vec<_> = stages.iter().map(|s| s.count).collect();
        // before, six filters, dedup, ordering
        assert_eq!(counts, vec![4, 3, 3, 3, 3, 3, 2, 1, 1]);
        assert_eq!(stages.get(&Stage::AfterOrdering), Some(1));
    }

    #[test]
    fn json_output_carries_stage_names() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("dev-1.jsonl"), format!("{COPY}\n")).unwrap();
        std::fs::write(temp.path().join("dev-2.jsonl"), "{not json\n").unwrap();
        let args = InspectArgs {
            input: temp.path().to_path_buf(),
            json: true,
        };

        let mut output = Vec::new();
        run(&mut output, &args, &Config::default()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value[0]["unit"], "dev-1");
        assert_eq!(value[0]["stages"][0]["stage"], "before applying any filter");
        assert_eq!(value[0]["stages"][0]["count"], 1);
        assert!(value[0].get("error").is_none());
        assert_eq!(value[1]["unit"], "dev-2");
        assert!(value[1]["error"].as_str().unwrap().starts_with("unit 'dev-2':"));
    }
}
