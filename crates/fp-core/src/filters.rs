//! Built-in filters that repair and normalize raw events.

use std::collections::BTreeSet;

use chrono::TimeDelta;

use crate::event::{DocumentAction, Event, EventKind};
use crate::event_type::EventType;
use crate::filter::{EventFilter, FilterError};

/// Command id that closing documents are rewritten to.
pub const CLOSE_COMMAND: &str = "Close";

/// Drops events without a trigger time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropUntimed;

impl EventFilter for DropUntimed {
    fn name(&self) -> String {
        "drop events without trigger time".to_string()
    }

    fn apply(&self, event: Event) -> Result<Option<Event>, FilterError> {
        Ok(event.triggered_at.is_some().then_some(event))
    }
}

/// Sets `terminated_at` to `triggered_at` when it is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillMissingTermination;

impl EventFilter for FillMissingTermination {
    fn name(&self) -> String {
        "fill missing termination time".to_string()
    }

    fn apply(&self, mut event: Event) -> Result<Option<Event>, FilterError> {
        if event.terminated_at.is_none() {
            event.terminated_at = event.triggered_at;
        }
        Ok(Some(event))
    }
}

/// Edit events report the end of the whole edit burst; only the trigger is reliable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetEditTermination;

impl EventFilter for ResetEditTermination {
    fn name(&self) -> String {
        "reset termination of edit events".to_string()
    }

    fn apply(&self, mut event: Event) -> Result<Option<Event>, FilterError> {
        if matches!(event.kind, EventKind::Edit { .. }) {
            event.terminated_at = event.triggered_at;
        }
        Ok(Some(event))
    }
}

/// Gives test results without a start time consecutive start times, beginning
/// at the trigger time of the test run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeTestResults;

impl EventFilter for TimeTestResults {
    fn name(&self) -> String {
        "add timing to test results".to_string()
    }

    fn apply(&self, mut event: Event) -> Result<Option<Event>, FilterError> {
        let Some(start) = event.triggered_at else {
            return Ok(Some(event));
        };
        if let EventKind::TestRun(run) = &mut event.kind {
            let mut next = start;
            for test in &mut run.tests {
                if test.duration < TimeDelta::zero() {
                    return Err(FilterError::new(
                        self.name(),
                        format!("negative duration for {}", test.test_method),
                    ));
                }
                let test_start = *test.start_time.get_or_insert(next);
                next = test_start.checked_add_signed(test.duration).ok_or_else(|| {
                    FilterError::new(
                        self.name(),
                        format!("duration of {} is out of range", test.test_method),
                    )
                })?;
            }
        }
        Ok(Some(event))
    }
}

/// Rewrites a closing document into a `Close` command on that document, so
/// consumers only need to understand one vocabulary for closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteDocumentClose;

impl EventFilter for RewriteDocumentClose {
    fn name(&self) -> String {
        "rewrite closing documents to close commands".to_string()
    }

    fn apply(&self, mut event: Event) -> Result<Option<Event>, FilterError> {
        if let EventKind::Document {
            document,
            action: DocumentAction::Closing,
        } = &event.kind
        {
            event.active_document = Some(document.clone());
            event.kind = EventKind::Command {
                command_id: CLOSE_COMMAND.to_string(),
            };
        }
        Ok(Some(event))
    }
}

/// Drops command events with one of the given ids.
#[derive(Debug, Clone, Default)]
pub struct DropCommands {
    ids: BTreeSet<String>,
}

impl DropCommands {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl EventFilter for DropCommands {
    fn name(&self) -> String {
        let ids: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        format!("command filter: {}", ids.join(", "))
    }

    fn apply(&self, event: Event) -> Result<Option<Event>, FilterError> {
        match event.command_id() {
            Some(id) if self.ids.contains(id) => Ok(None),
            _ => Ok(Some(event)),
        }
    }
}

/// Drops every event of the given kinds.
#[derive(Debug, Clone, Default)]
pub struct DropKinds {
    kinds: BTreeSet<EventType>,
}

impl DropKinds {
    pub fn new(kinds: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }
}

impl EventFilter for DropKinds {
    fn name(&self) -> String {
        let kinds: Vec<&str> = self.kinds.iter().map(EventType::as_str).collect();
        format!("kind filter: {}", kinds.join(", "))
    }

    fn apply(&self, event: Event) -> Result<Option<Event>, FilterError> {
        Ok((!self.kinds.contains(&event.event_type())).then_some(event))
    }
}
