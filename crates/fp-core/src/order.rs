//! Time ordering of event streams.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;

/// How a stage treats input that is not already in trigger order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Stable-sort by trigger time.
    #[default]
    Sort,
    /// Fail on the first event that precedes its predecessor.
    Strict,
}

/// An event precedes the event before it.
///
/// `index` is the position of `later` in the stream; `earlier` is the event
/// that came before it in the stream but carries the later trigger time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "event #{index} triggered at {later_at} precedes the previous event triggered at {earlier_at}",
    earlier_at = fmt_trigger(.earlier),
    later_at = fmt_trigger(.later)
)]
pub struct OrderingError {
    pub index: usize,
    pub earlier: Box<Event>,
    pub later: Box<Event>,
}

impl OrderingError {
    pub fn new(index: usize, earlier: &Event, later: &Event) -> Self {
        Self {
            index,
            earlier: Box::new(earlier.clone()),
            later: Box::new(later.clone()),
        }
    }
}

fn fmt_trigger(event: &Event) -> String {
    event
        .triggered_at
        .map_or_else(|| "<none>".to_string(), |t| t.to_rfc3339())
}

/// Sorts ascending by `triggered_at`. Events without a trigger time sort
/// first. The sort is stable, so equal times keep their input order.
pub fn order(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by_key(|event| event.triggered_at);
    events
}

/// Checks that the timed events in `events` are non-decreasing in trigger
/// time. Untimed events are ignored.
pub fn ensure_ordered(events: &[Event]) -> Result<(), OrderingError> {
    let mut previous: Option<&Event> = None;
    for (index, event) in events.iter().enumerate() {
        let Some(at) = event.triggered_at else {
            continue;
        };
        if let Some(prev) = previous {
            if prev.triggered_at.is_some_and(|prev_at| at < prev_at) {
                return Err(OrderingError::new(index, prev, event));
            }
        }
        previous = Some(event);
    }
    Ok(())
}

pub fn is_ordered(events: &[Event]) -> bool {
    ensure_ordered(events).is_ok()
}

/// Orders `events` according to `mode`.
pub fn apply(mode: OrderingMode, events: Vec<Event>) -> Result<Vec<Event>, OrderingError> {
    match mode {
        OrderingMode::Sort => Ok(order(events)),
        OrderingMode::Strict => {
            ensure_ordered(&events)?;
            Ok(events)
        }
    }
}
