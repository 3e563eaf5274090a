use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{IntervalTransformer, OpenSpan, TransformerContext};
use crate::event::{Event, EventKind, IdePhase};
use crate::interval::{Interval, IntervalKind};

/// Tracks how long each IDE session was running.
///
/// A session opens on its first event (or a startup) and is extended by every
/// event of that session. Shutdown closes it. Whatever is still open at the
/// end of the stream closes at the session's last event.
#[derive(Debug, Default)]
pub struct IdeOpenTransformer {
    open: BTreeMap<String, OpenSpan>,
    closed: Vec<Interval>,
}

impl IntervalTransformer for IdeOpenTransformer {
    fn name(&self) -> &'static str {
        "ide_open"
    }

    fn process_event(&mut self, event: &Event, context: &TransformerContext) {
        let Some((start, end)) = event.span() else {
            return;
        };

        match &event.kind {
            EventKind::IdeState {
                phase: IdePhase::Startup,
            } => {
                if let Some(previous) = self.open.remove(&event.session_id) {
                    tracing::debug!(
                        session = %event.session_id,
                        "startup of an open session, closing and reopening"
                    );
                    self.closed.push(previous.close(context, IntervalKind::IdeOpen));
                }
                let mut span = OpenSpan::open(event, start, context);
                span.extend_to(end);
                self.open.insert(event.session_id.clone(), span);
            }
            EventKind::IdeState {
                phase: IdePhase::Shutdown,
            } => {
                let mut span = self
                    .open
                    .remove(&event.session_id)
                    .unwrap_or_else(|| OpenSpan::open(event, start, context));
                span.extend_to(end);
                self.closed.push(span.close(context, IntervalKind::IdeOpen));
            }
            _ => {
                self.open
                    .entry(event.session_id.clone())
                    .or_insert_with(|| OpenSpan::open(event, start, context))
                    .extend_to(end);
            }
        }
    }

    fn signal_end_of_stream(
        &mut self,
        _stream_end: DateTime<Utc>,
        context: &TransformerContext,
    ) -> Vec<Interval> {
        let still_open = std::mem::take(&mut self.open);
        self.closed.extend(
            still_open
                .into_values()
                .map(|span| span.close(context, IntervalKind::IdeOpen)),
        );
        std::mem::take(&mut self.closed)
    }
}
