//! Merging of fragmented completion events into completion sessions.
//!
//! While the developer keeps typing, the IDE filters an open completion popup
//! and reports each filtering step as its own completion event. Those
//! fragments are folded back into one event that spans the popup's whole
//! life, from the first trigger to the final termination.
//!
//! # Rebasing
//!
//! A selection's `selected_after` is relative to the trigger time of the
//! event it was recorded in. When a later fragment is folded into an earlier
//! one, its selections are shifted by the distance between the two trigger
//! times, so that all offsets are relative to the merged session's trigger.

use std::collections::HashMap;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::event::{Completion, Event, EventKind, ProposalSelection, TerminationState, Trigger};
use crate::order::OrderingError;

/// One completion popup, possibly rebuilt from several fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSession {
    pub event: Event,
    /// Number of raw completion events merged into `event`.
    pub fragments: usize,
}

/// Whether `later` continues the popup recorded by `earlier`.
///
/// Only an automatically triggered popup that was closed by filtering, and
/// in which the developer selected at most one proposal, is folded into the
/// next one. Both events must be timed completion events.
/// The rebased selections must also stay within the representable range.
pub fn are_mergeable(earlier: &Event, later: &Event) -> bool {
    let (Some(first), Some(last), Some(from), Some(to)) = (
        earlier.completion(),
        later.completion(),
        earlier.triggered_at,
        later.triggered_at,
    ) else {
        return false;
    };
    earlier.triggered_by == Trigger::Automatic
        && earlier.terminated_by == Trigger::Automatic
        && first.terminated_state == TerminationState::Filtered
        && first.selections.len() <= 1
        && rebase(&last.selections, to - from).is_some()
}

fn rebase(selections: &[ProposalSelection], offset: TimeDelta) -> Option<Vec<ProposalSelection>> {
    selections
        .iter()
        .map(|selection| {
            Some(ProposalSelection {
                proposal: selection.proposal.clone(),
                selected_after: selection.selected_after.checked_add(&offset)?,
            })
        })
        .collect()
}

/// Folds `later` into `earlier`.
///
/// Identity and invocation come from `earlier`, the outcome from `later`.
///
/// # Panics
///
/// Panics if the pair is not mergeable; check [`are_mergeable`] first.
pub fn merge(earlier: &Event, later: &Event) -> Event {
    assert!(
        are_mergeable(earlier, later),
        "merge called on completion events that are not mergeable"
    );
    let (Some(first), Some(last), Some(from), Some(to)) = (
        earlier.completion(),
        later.completion(),
        earlier.triggered_at,
        later.triggered_at,
    ) else {
        unreachable!("mergeable events are timed completions");
    };
    let Some(rebased) = rebase(&last.selections, to - from) else {
        unreachable!("mergeable selections rebase within range");
    };

    let selections = first.selections.iter().cloned().chain(rebased).collect();

    Event {
        session_id: earlier.session_id.clone(),
        triggered_at: earlier.triggered_at,
        triggered_by: earlier.triggered_by,
        terminated_at: later.terminated_at,
        terminated_by: later.terminated_by,
        active_window: earlier.active_window.clone(),
        active_document: earlier.active_document.clone(),
        tool_version: earlier.tool_version.clone(),
        kind: EventKind::Completion(Completion {
            context: first.context.clone(),
            prefix: last.prefix.clone(),
            proposals: last.proposals.clone(),
            selections,
            terminated_state: last.terminated_state,
        }),
    }
}

/// Left-to-right merger over one unit's ordered stream.
///
/// Keeps the most recent session per IDE session, so a chain of mergeable
/// fragments collapses in a single pass. Build a new merger for every unit.
#[derive(Debug, Default)]
pub struct CompletionMerger<'a> {
    sessions: Vec<CompletionSession>,
    latest: HashMap<String, usize>,
    previous: Option<&'a Event>,
    index: usize,
}

impl<'a> CompletionMerger<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next event of the stream. Non-completion events are ignored.
    ///
    /// Fails if a completion event was triggered before the previous one.
    pub fn push(&mut self, event: &'a Event) -> Result<(), OrderingError> {
        let index = self.index;
        self.index += 1;

        if event.completion().is_none() {
            return Ok(());
        }
        if let Some(at) = event.triggered_at {
            if let Some(previous) = self.previous {
                if previous.triggered_at.is_some_and(|prev| at < prev) {
                    return Err(OrderingError::new(index, previous, event));
                }
            }
            self.previous = Some(event);
        }

        if let Some(&slot) = self.latest.get(&event.session_id) {
            let session = &mut self.sessions[slot];
            if are_mergeable(&session.event, event) {
                session.event = merge(&session.event, event);
                session.fragments += 1;
                return Ok(());
            }
        }

        self.latest
            .insert(event.session_id.clone(), self.sessions.len());
        self.sessions.push(CompletionSession {
            event: event.clone(),
            fragments: 1,
        });
        Ok(())
    }

    /// Sessions in order of their first fragment.
    pub fn finish(self) -> Vec<CompletionSession> {
        let merged = self
            .sessions
            .iter()
            .filter(|session| session.fragments > 1)
            .count();
        if merged > 0 {
            tracing::debug!(
                sessions = self.sessions.len(),
                merged,
                "merged completion fragments"
            );
        }
        self.sessions
    }
}

/// Merges the completion events of an ordered stream into sessions.
pub fn merge_completions(events: &[Event]) -> Result<Vec<CompletionSession>, OrderingError> {
    let mut merger = CompletionMerger::new();
    for event in events {
        merger.push(event)?;
    }
    Ok(merger.finish())
}
