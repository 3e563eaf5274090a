//! IDE interaction events.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::event_type::EventType;

/// How an event was started or ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    #[default]
    Unknown,
    Automatic,
    Shortcut,
    Typing,
    Click,
}

/// One timestamped developer interaction with the editor.
///
/// Equality and hashing are structural over every field, which is what the
/// deduplicator relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Groups events from one IDE session.
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub triggered_by: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub terminated_by: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_document: Option<String>,
    /// Version of the tool that captured the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    pub kind: EventKind,
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Command {
        command_id: String,
    },
    Completion(Completion),
    Document {
        document: String,
        action: DocumentAction,
    },
    Window {
        window: String,
        action: WindowAction,
    },
    Edit {
        #[serde(default)]
        number_of_changes: u32,
        #[serde(default)]
        size_of_changes: u32,
    },
    Build {
        #[serde(default)]
        scope: String,
        #[serde(default)]
        action: String,
    },
    Debugger {
        mode: DebuggerMode,
        #[serde(default)]
        reason: String,
    },
    IdeState {
        phase: IdePhase,
    },
    Solution {
        action: SolutionAction,
        #[serde(default)]
        target: String,
    },
    TestRun(TestRun),
    /// Mouse or keyboard presence without a more specific meaning.
    Activity,
    Navigation {
        #[serde(default)]
        target: String,
        #[serde(default)]
        location: String,
    },
    GitAction {
        action: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    Opened,
    Saved,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAction {
    Create,
    Activate,
    Move,
    Close,
    Deactivate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebuggerMode {
    Design,
    Run,
    Break,
    ExceptionThrown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdePhase {
    Startup,
    Runtime,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionAction {
    OpenSolution,
    CloseSolution,
    RenameSolution,
    AddProject,
    RemoveProject,
    AddSolutionItem,
    RemoveSolutionItem,
}

/// How a completion popup ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationState {
    Applied,
    Cancelled,
    /// The popup was narrowed by further typing.
    Filtered,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proposal {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<i32>,
}

impl Proposal {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relevance: None,
        }
    }
}

/// A proposal highlighted in the popup, `selected_after` the popup's trigger time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalSelection {
    pub proposal: Proposal,
    #[serde(with = "crate::time::duration_ms")]
    pub selected_after: TimeDelta,
}

/// Payload of a completion event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Completion {
    /// Opaque description of the code context the popup was invoked in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub prefix: String,
    /// Ranked proposals, best first.
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    /// Selections in chronological order.
    #[serde(default)]
    pub selections: Vec<ProposalSelection>,
    #[serde(default)]
    pub terminated_state: TerminationState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResult {
    #[default]
    Unknown,
    Success,
    Failed,
    Error,
    Ignored,
}

impl TestResult {
    const fn severity(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Ignored => 1,
            Self::Success => 2,
            Self::Failed => 3,
            Self::Error => 4,
        }
    }

    /// Combines two results, keeping the more severe one.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Fully qualified method, e.g. `App.Tests.ParserTest.ParsesEmptyInput`.
    pub test_method: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::time::duration_ms")]
    pub duration: TimeDelta,
    #[serde(default)]
    pub result: TestResult,
}

impl TestCaseResult {
    /// Splits `test_method` into `(class, method)` at the last dot.
    pub fn class_and_method(&self) -> (&str, &str) {
        self.test_method
            .rsplit_once('.')
            .unwrap_or(("", self.test_method.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestRun {
    #[serde(default)]
    pub was_aborted: bool,
    #[serde(default)]
    pub tests: Vec<TestCaseResult>,
}

impl Event {
    /// Creates an event of the given kind with every common field unset.
    pub fn new(kind: EventKind) -> Self {
        Self {
            session_id: String::new(),
            triggered_at: None,
            triggered_by: Trigger::Unknown,
            terminated_at: None,
            terminated_by: Trigger::Unknown,
            active_window: None,
            active_document: None,
            tool_version: None,
            kind,
        }
    }

    pub fn command(command_id: impl Into<String>) -> Self {
        Self::new(EventKind::Command {
            command_id: command_id.into(),
        })
    }

    pub fn document(document: impl Into<String>, action: DocumentAction) -> Self {
        let document = document.into();
        let mut event = Self::new(EventKind::Document {
            document: document.clone(),
            action,
        });
        event.active_document = Some(document);
        event
    }

    #[must_use]
    pub fn at(mut self, triggered_at: DateTime<Utc>) -> Self {
        self.triggered_at = Some(triggered_at);
        self
    }

    #[must_use]
    pub fn until(mut self, terminated_at: DateTime<Utc>) -> Self {
        self.terminated_at = Some(terminated_at);
        self
    }

    #[must_use]
    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn on_document(mut self, document: impl Into<String>) -> Self {
        self.active_document = Some(document.into());
        self
    }

    #[must_use]
    pub fn in_window(mut self, window: impl Into<String>) -> Self {
        self.active_window = Some(window.into());
        self
    }

    pub const fn event_type(&self) -> EventType {
        match &self.kind {
            EventKind::Command { .. } => EventType::Command,
            EventKind::Completion(_) => EventType::Completion,
            EventKind::Document { .. } => EventType::Document,
            EventKind::Window { .. } => EventType::Window,
            EventKind::Edit { .. } => EventType::Edit,
            EventKind::Build { .. } => EventType::Build,
            EventKind::Debugger { .. } => EventType::Debugger,
            EventKind::IdeState { .. } => EventType::IdeState,
            EventKind::Solution { .. } => EventType::Solution,
            EventKind::TestRun(_) => EventType::TestRun,
            EventKind::Activity => EventType::Activity,
            EventKind::Navigation { .. } => EventType::Navigation,
            EventKind::GitAction { .. } => EventType::GitAction,
        }
    }

    /// End of the event: `terminated_at`, or `triggered_at` for instantaneous events.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.terminated_at.or(self.triggered_at)
    }

    /// `(start, end)` when the event has a trigger time. The end never precedes the start.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.triggered_at?;
        let end = self.terminated_at.map_or(start, |end| end.max(start));
        Some((start, end))
    }

    pub const fn completion(&self) -> Option<&Completion> {
        match &self.kind {
            EventKind::Completion(completion) => Some(completion),
            _ => None,
        }
    }

    pub fn command_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Command { command_id } => Some(command_id),
            _ => None,
        }
    }
}
