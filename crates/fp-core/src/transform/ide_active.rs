use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{IntervalTransformer, OpenSpan, TransformerContext};
use crate::event::{Event, EventKind, IdePhase, WindowAction};
use crate::interval::{Interval, IntervalKind};

/// Tracks when the IDE main window had focus.
///
/// Activation of the main window opens an interval, deactivation or shutdown
/// closes it. Events in between extend it. An interval still open at the end
/// of the stream closes at the last event seen while it was active.
#[derive(Debug, Default)]
pub struct IdeActiveTransformer {
    open: BTreeMap<String, OpenSpan>,
    closed: Vec<Interval>,
}

fn is_main_window(window: &str) -> bool {
    let window = window.to_ascii_lowercase();
    window.contains("mainwindow") || window == "main window"
}

impl IdeActiveTransformer {
    fn close(&mut self, session_id: &str, at: DateTime<Utc>, context: &TransformerContext) {
        if let Some(mut span) = self.open.remove(session_id) {
            span.extend_to(at);
            self.closed.push(span.close(context, IntervalKind::IdeActive));
        }
    }

    fn reopen(&mut self, event: &Event, start: DateTime<Utc>, context: &TransformerContext) {
        if self.open.contains_key(&event.session_id) {
            tracing::debug!(
                session = %event.session_id,
                "main window activated while active, closing and reopening"
            );
            self.close(&event.session_id, start, context);
        }
        self.open.insert(
            event.session_id.clone(),
            OpenSpan::open(event, start, context),
        );
    }
}

impl IntervalTransformer for IdeActiveTransformer {
    fn name(&self) -> &'static str {
        "ide_active"
    }

    fn process_event(&mut self, event: &Event, context: &TransformerContext) {
        let Some((start, end)) = event.span() else {
            return;
        };

        match &event.kind {
            EventKind::Window {
                window,
                action: WindowAction::Activate,
            } if is_main_window(window) => self.reopen(event, start, context),
            EventKind::IdeState {
                phase: IdePhase::Startup,
            } => self.reopen(event, start, context),
            EventKind::Window {
                window,
                action: WindowAction::Deactivate,
            } if is_main_window(window) => self.close(&event.session_id, start, context),
            EventKind::IdeState {
                phase: IdePhase::Shutdown,
            } => self.close(&event.session_id, start, context),
            _ => {
                if let Some(span) = self.open.get_mut(&event.session_id) {
                    span.extend_to(end);
                }
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
                .map(|span| span.close(context, IntervalKind::IdeActive)),
        );
        std::mem::take(&mut self.closed)
    }
}
