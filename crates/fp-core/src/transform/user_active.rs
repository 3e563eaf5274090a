use chrono::{DateTime, TimeDelta, Utc};

use super::{IntervalTransformer, OpenSpan, TransformerContext};
use crate::event::{Event, EventKind, IdePhase};
use crate::interval::{Interval, IntervalKind};

/// Tracks periods in which the developer kept interacting with the IDE.
///
/// Any event except IDE lifecycle changes counts as activity. A gap longer
/// than the timeout ends the interval at the end of the last activity.
#[derive(Debug)]
pub struct UserActiveTransformer {
    timeout: TimeDelta,
    current: Option<OpenSpan>,
    closed: Vec<Interval>,
}

impl UserActiveTransformer {
    pub const fn new(timeout: TimeDelta) -> Self {
        Self {
            timeout,
            current: None,
            closed: Vec::new(),
        }
    }

    fn close_current(&mut self, context: &TransformerContext) {
        if let Some(span) = self.current.take() {
            self.closed.push(span.close(context, IntervalKind::UserActive));
        }
    }
}

impl IntervalTransformer for UserActiveTransformer {
    fn name(&self) -> &'static str {
        "user_active"
    }

    fn process_event(&mut self, event: &Event, context: &TransformerContext) {
        let Some((start, end)) = event.span() else {
            return;
        };

        match &event.kind {
            EventKind::IdeState {
                phase: IdePhase::Shutdown,
            } => {
                self.close_current(context);
                return;
            }
            EventKind::IdeState { .. } => return,
            _ => {}
        }

        if self
            .current
            .as_ref()
            .is_some_and(|span| start - span.end > self.timeout)
        {
            self.close_current(context);
        }
        self.current
            .get_or_insert_with(|| OpenSpan::open(event, start, context))
            .extend_to(end);
    }

    fn signal_end_of_stream(
        &mut self,
        _stream_end: DateTime<Utc>,
        context: &TransformerContext,
    ) -> Vec<Interval> {
        self.close_current(context);
        std::mem::take(&mut self.closed)
    }
}
