//! Semantic intervals derived from the event stream.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::event::TestResult;

/// A closed, contiguous span of one activity.
///
/// The end is derived from `start_time + duration` and never stored, so the
/// two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start_time: DateTime<Utc>,
    #[serde(with = "crate::time::duration_ms")]
    pub duration: TimeDelta,
    pub user_id: String,
    pub session_id: String,
    #[serde(default)]
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
    pub kind: IntervalKind,
}

impl Interval {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_zero()
    }
}

/// Activity-specific part of an interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntervalKind {
    /// The IDE process was running.
    IdeOpen,
    /// The IDE main window had focus.
    IdeActive,
    /// The developer was interacting, with no gap longer than the activity timeout.
    UserActive,
    Perspective {
        perspective: PerspectiveType,
    },
    FileInteraction {
        file_name: String,
        file_type: DocumentType,
        interaction: FileInteractionType,
    },
    TestRun(TestRunSummary),
}

impl IntervalKind {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::IdeOpen => "ide_open",
            Self::IdeActive => "ide_active",
            Self::UserActive => "user_active",
            Self::Perspective { .. } => "perspective",
            Self::FileInteraction { .. } => "file_interaction",
            Self::TestRun(_) => "test_run",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerspectiveType {
    Production,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileInteractionType {
    Reading,
    Typing,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    Undefined,
    Production,
    Test,
}

/// Directory names that mark test code.
const TEST_DIRECTORIES: &[&str] = &["test", "tests", "spec", "specs"];

impl DocumentType {
    /// Classifies a document by its path.
    ///
    /// Files whose stem starts or ends with `Test`/`Tests`, or that live below a
    /// test directory, are test code.
    pub fn classify(path: &str) -> Self {
        if path.trim().is_empty() {
            return Self::Undefined;
        }

        let mut segments: Vec<&str> = path.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            return Self::Undefined;
        };
        let stem = file_name
            .rsplit_once('.')
            .map_or(file_name, |(stem, _)| stem)
            .to_ascii_lowercase();

        let stem_is_test = stem.starts_with("test")
            || stem.ends_with("test")
            || stem.ends_with("tests")
            || stem.ends_with("_spec");
        let dir_is_test = segments
            .iter()
            .any(|s| TEST_DIRECTORIES.contains(&s.to_ascii_lowercase().as_str()));

        if stem_is_test || dir_is_test {
            Self::Test
        } else {
            Self::Production
        }
    }
}

/// Result of one test run, grouped by test class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunSummary {
    pub result: TestResult,
    #[serde(default)]
    pub aborted: bool,
    #[serde(default)]
    pub classes: Vec<TestClassResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestClassResult {
    pub name: String,
    #[serde(with = "crate::time::duration_ms")]
    pub duration: TimeDelta,
    pub result: TestResult,
    pub methods: Vec<TestMethodResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMethodResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameters: String,
    #[serde(with = "crate::time::duration_ms")]
    pub duration: TimeDelta,
    pub result: TestResult,
}
