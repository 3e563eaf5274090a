use chrono::{DateTime, Utc};

use super::{IntervalTransformer, OpenSpan, TransformerContext};
use crate::event::{DebuggerMode, Event, EventKind, IdePhase};
use crate::interval::{Interval, IntervalKind, PerspectiveType};

/// Splits IDE time into production and debug perspectives.
///
/// Debugger mode changes switch the perspective; a switch cuts the current
/// interval at the trigger time of the switching event. The first event of
/// the stream opens a production perspective.
#[derive(Debug, Default)]
pub struct PerspectiveTransformer {
    current: Option<(PerspectiveType, OpenSpan)>,
    closed: Vec<Interval>,
}

const fn perspective_of(kind: &EventKind) -> Option<PerspectiveType> {
    match kind {
        EventKind::Debugger {
            mode: DebuggerMode::Run | DebuggerMode::Break | DebuggerMode::ExceptionThrown,
            ..
        } => Some(PerspectiveType::Debug),
        EventKind::Debugger {
            mode: DebuggerMode::Design,
            ..
        }
        | EventKind::IdeState {
            phase: IdePhase::Startup,
        } => Some(PerspectiveType::Production),
        _ => None,
    }
}

impl PerspectiveTransformer {
    fn close_current(&mut self, at: DateTime<Utc>, context: &TransformerContext) {
        if let Some((perspective, mut span)) = self.current.take() {
            span.extend_to(at);
            self.closed
                .push(span.close(context, IntervalKind::Perspective { perspective }));
        }
    }
}

impl IntervalTransformer for PerspectiveTransformer {
    fn name(&self) -> &'static str {
        "perspective"
    }

    fn process_event(&mut self, event: &Event, context: &TransformerContext) {
        let Some((start, end)) = event.span() else {
            return;
        };

        if matches!(
            event.kind,
            EventKind::IdeState {
                phase: IdePhase::Shutdown
            }
        ) {
            self.close_current(start, context);
            return;
        }

        let wanted = perspective_of(&event.kind);
        let current = self.current.as_ref().map(|(perspective, _)| *perspective);
        match (current, wanted) {
            (Some(current), Some(wanted)) if current != wanted => {
                self.close_current(start, context);
                self.current = Some((wanted, OpenSpan::open(event, start, context)));
            }
            (None, wanted) => {
                let perspective = wanted.unwrap_or(PerspectiveType::Production);
                self.current = Some((perspective, OpenSpan::open(event, start, context)));
            }
            _ => {}
        }

        if let Some((_, span)) = &mut self.current {
            span.extend_to(end);
        }
    }

    fn signal_end_of_stream(
        &mut self,
        stream_end: DateTime<Utc>,
        context: &TransformerContext,
    ) -> Vec<Interval> {
        self.close_current(stream_end, context);
        std::mem::take(&mut self.closed)
    }
}
