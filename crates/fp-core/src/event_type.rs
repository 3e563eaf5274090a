//! Event type enum as the single source of truth for event kind names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discriminator of [`crate::EventKind`], without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Command,
    Completion,
    Document,
    Window,
    Edit,
    Build,
    Debugger,
    IdeState,
    Solution,
    TestRun,
    Activity,
    Navigation,
    GitAction,
}

impl EventType {
    pub const ALL: [Self; 13] = [
        Self::Command,
        Self::Completion,
        Self::Document,
        Self::Window,
        Self::Edit,
        Self::Build,
        Self::Debugger,
        Self::IdeState,
        Self::Solution,
        Self::TestRun,
        Self::Activity,
        Self::Navigation,
        Self::GitAction,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Completion => "completion",
            Self::Document => "document",
            Self::Window => "window",
            Self::Edit => "edit",
            Self::Build => "build",
            Self::Debugger => "debugger",
            Self::IdeState => "ide_state",
            Self::Solution => "solution",
            Self::TestRun => "test_run",
            Self::Activity => "activity",
            Self::Navigation => "navigation",
            Self::GitAction => "git_action",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "command" => Ok(Self::Command),
            "completion" => Ok(Self::Completion),
            "document" => Ok(Self::Document),
            "window" => Ok(Self::Window),
            "edit" => Ok(Self::Edit),
            "build" => Ok(Self::Build),
            "debugger" => Ok(Self::Debugger),
            "ide_state" => Ok(Self::IdeState),
            "solution" => Ok(Self::Solution),
            "test_run" => Ok(Self::TestRun),
            "activity" => Ok(Self::Activity),
            "navigation" => Ok(Self::Navigation),
            "git_action" => Ok(Self::GitAction),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event type strings.
#[derive(Debug, Clone)]
pub struct UnknownEventType(String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        for variant in &EventType::ALL {
            let s = variant.to_string();
            let parsed: EventType = s.parse().expect("should parse");
            assert_eq!(parsed, *variant, "roundtrip failed for {variant:?}");
        }
    }

    #[test]
    fn unknown_type_errors() {
        let result: Result<EventType, _> = "keystroke".parse();
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "unknown event type: keystroke");
    }

    #[test]
    fn only_canonical_names_parse() {
        let result: Result<EventType, _> = "ide_lifecycle".parse();
        assert!(result.is_err());
    }
}
