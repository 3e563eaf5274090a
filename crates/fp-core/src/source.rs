//! Where events come from and where results go.
//!
//! The core does not own a storage format. Drivers implement these traits
//! over whatever holds the raw events; [`MemorySource`] and [`MemorySink`]
//! keep everything in memory.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

use crate::event::Event;
use crate::interval::Interval;
use crate::merge::CompletionSession;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}:{line}: {source}", .path.display())]
    Json {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// Supplies the raw events of named units.
pub trait EventSource: Sync {
    /// Names of all units, in a stable order.
    fn units(&self) -> Result<Vec<String>, SourceError>;

    /// Every event of one unit, possibly unordered and duplicated.
    fn read_unit(&self, unit: &str) -> Result<Vec<Event>, SourceError>;
}

pub trait EventSink: Sync {
    fn write_events(&self, unit: &str, events: &[Event]) -> Result<(), SourceError>;
}

pub trait IntervalSink: Sync {
    fn write_intervals(&self, unit: &str, intervals: &[Interval]) -> Result<(), SourceError>;
}

pub trait CompletionSink: Sync {
    fn write_completions(
        &self,
        unit: &str,
        sessions: &[CompletionSession],
    ) -> Result<(), SourceError>;
}

/// Units held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    units: BTreeMap<String, Vec<Event>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>, events: Vec<Event>) -> Self {
        self.units.insert(unit.into(), events);
        self
    }
}

impl EventSource for MemorySource {
    fn units(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.units.keys().cloned().collect())
    }

    fn read_unit(&self, unit: &str) -> Result<Vec<Event>, SourceError> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| SourceError::UnknownUnit(unit.to_string()))
    }
}

/// Collects everything written to it, keyed by unit.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Mutex<BTreeMap<String, Vec<Event>>>,
    pub intervals: Mutex<BTreeMap<String, Vec<Interval>>>,
    pub completions: Mutex<BTreeMap<String, Vec<CompletionSession>>>,
}

fn store<T: Clone>(target: &Mutex<BTreeMap<String, Vec<T>>>, unit: &str, items: &[T]) {
    // A poisoned map still holds every completed write.
    let mut map = target
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    map.insert(unit.to_string(), items.to_vec());
}

impl EventSink for MemorySink {
    fn write_events(&self, unit: &str, events: &[Event]) -> Result<(), SourceError> {
        store(&self.events, unit, events);
        Ok(())
    }
}

impl IntervalSink for MemorySink {
    fn write_intervals(&self, unit: &str, intervals: &[Interval]) -> Result<(), SourceError> {
        store(&self.intervals, unit, intervals);
        Ok(())
    }
}

impl CompletionSink for MemorySink {
    fn write_completions(
        &self,
        unit: &str,
        sessions: &[CompletionSession],
    ) -> Result<(), SourceError> {
        store(&self.completions, unit, sessions);
        Ok(())
    }
}
