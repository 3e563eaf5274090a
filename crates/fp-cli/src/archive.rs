//! Directories of newline-delimited JSON archives.
//!
//! Every `*.jsonl` file below the root is one unit. The unit name is the
//! file's path relative to the root, without the extension and with `/` as
//! separator, so `2016/dev-1.jsonl` becomes the unit `2016/dev-1`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use fp_core::{
    CompletionSession, CompletionSink, Event, EventSink, EventSource, Interval, IntervalSink,
    SourceError,
};

const ARCHIVE_EXTENSION: &str = "jsonl";

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SourceError + '_ {
    move |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads units from a directory tree of JSONL archives.
#[derive(Debug, Clone)]
pub struct JsonlArchiveDir {
    root: PathBuf,
}

impl JsonlArchiveDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn unit_path(&self, unit: &str) -> PathBuf {
        self.root.join(format!("{unit}.{ARCHIVE_EXTENSION}"))
    }

    fn collect_units(&self, dir: &Path, units: &mut Vec<String>) -> Result<(), SourceError> {
        for entry in fs::read_dir(dir).map_err(io_error(dir))? {
            let path = entry.map_err(io_error(dir))?.path();
            if path.is_dir() {
                self.collect_units(&path, units)?;
                continue;
            }
            if path.extension().is_none_or(|ext| ext != ARCHIVE_EXTENSION) {
                continue;
            }
            let stem = path.with_extension("");
            let Ok(relative) = stem.strip_prefix(&self.root) else {
                continue;
            };
            let name: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            units.push(name.join("/"));
        }
        Ok(())
    }
}

impl EventSource for JsonlArchiveDir {
    fn units(&self) -> Result<Vec<String>, SourceError> {
        let mut units = Vec::new();
        self.collect_units(&self.root, &mut units)?;
        units.sort();
        Ok(units)
    }

    fn read_unit(&self, unit: &str) -> Result<Vec<Event>, SourceError> {
        let path = self.unit_path(unit);
        let file = File::open(&path).map_err(io_error(&path))?;
        parse_events(BufReader::new(file), &path)
    }
}

/// Parses one event per line. Blank lines are skipped.
fn parse_events<R: BufRead>(reader: R, path: &Path) -> Result<Vec<Event>, SourceError> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error(path))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| SourceError::Json {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Writes results as `<unit>.events.jsonl`, `<unit>.intervals.jsonl` and
/// `<unit>.completions.jsonl` below the root.
#[derive(Debug, Clone)]
pub struct JsonlOutputDir {
    root: PathBuf,
}

/// File kinds written per unit, in write order.
pub const OUTPUT_KINDS: [&str; 3] = ["events", "intervals", "completions"];

impl JsonlOutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn output_path(&self, unit: &str, kind: &str) -> PathBuf {
        self.root.join(format!("{unit}.{kind}.{ARCHIVE_EXTENSION}"))
    }

    /// Removes whatever output files of `unit` exist, so a unit that failed
    /// halfway leaves nothing behind. Paths that are not regular files are
    /// left alone.
    pub fn discard(&self, unit: &str) {
        for kind in OUTPUT_KINDS {
            let path = self.output_path(unit, kind);
            if !path.is_file() {
                continue;
            }
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove partial output");
            }
        }
    }

    fn write_lines<T: Serialize>(
        &self,
        unit: &str,
        kind: &str,
        items: &[T],
    ) -> Result<(), SourceError> {
        let path = self.output_path(unit, kind);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let file = File::create(&path).map_err(io_error(&path))?;
        let mut writer = BufWriter::new(file);
        for (idx, item) in items.iter().enumerate() {
            serde_json::to_writer(&mut writer, item).map_err(|source| SourceError::Json {
                path: path.clone(),
                line: idx + 1,
                source,
            })?;
            writeln!(writer).map_err(io_error(&path))?;
        }
        writer.flush().map_err(io_error(&path))
    }
}

impl EventSink for JsonlOutputDir {
    fn write_events(&self, unit: &str, events: &[Event]) -> Result<(), SourceError> {
        self.write_lines(unit, "events", events)
    }
}

impl IntervalSink for JsonlOutputDir {
    fn write_intervals(&self, unit: &str, intervals: &[Interval]) -> Result<(), SourceError> {
        self.write_lines(unit, "intervals", intervals)
    }
}

impl CompletionSink for JsonlOutputDir {
    fn write_completions(
        &self,
        unit: &str,
        sessions: &[CompletionSession],
    ) -> Result<(), SourceError> {
        self.write_lines(unit, "completions", sessions)
    }
}
