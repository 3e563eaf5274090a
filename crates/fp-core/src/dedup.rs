//! Removal of structurally equal events.

use std::collections::HashSet;

use crate::event::Event;

/// Removes every event equal to one seen earlier in `events`, keeping the
/// first occurrence in its original position.
///
/// The seen-set hashes whole events and compares them with `==` on hash
/// collisions, so two events are only merged when every field matches.
pub fn deduplicate(events: Vec<Event>) -> Vec<Event> {
    let keep: Vec<bool> = {
        let mut seen: HashSet<&Event> = HashSet::with_capacity(events.len());
        events.iter().map(|event| seen.insert(event)).collect()
    };

    let before = events.len();
    let unique: Vec<Event> = events
        .into_iter()
        .zip(keep)
        .filter_map(|(event, keep)| keep.then_some(event))
        .collect();

    if unique.len() < before {
        tracing::debug!(removed = before - unique.len(), "removed duplicate events");
    }
    unique
}
