use chrono::{DateTime, TimeDelta, Utc};

use super::{IntervalTransformer, OpenSpan, TransformerContext};
use crate::event::{DebuggerMode, DocumentAction, Event, EventKind, IdePhase};
use crate::filters::CLOSE_COMMAND;
use crate::interval::{DocumentType, FileInteractionType, Interval, IntervalKind};

/// Command prefixes that change the text of the active document.
const TYPING_COMMAND_PREFIXES: &[&str] = &["TextControl.", "Completion.", "VsAction:1:Edit."];

#[derive(Debug)]
struct OpenFile {
    file: String,
    interaction: FileInteractionType,
    span: OpenSpan,
}

/// Tracks reading and typing in one document at a time.
///
/// The subject is the document of a document event, otherwise the event's
/// active document. An interval ends when the developer switches documents,
/// switches between reading and typing, closes the document, starts a test
/// run, or is idle for longer than the timeout.
#[derive(Debug)]
pub struct FileInteractionTransformer {
    timeout: TimeDelta,
    current: Option<OpenFile>,
    debugging: bool,
    closed: Vec<Interval>,
}

fn subject(event: &Event) -> Option<&str> {
    match &event.kind {
        EventKind::Document { document, .. } => Some(document),
        _ => event.active_document.as_deref(),
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn is_close(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Document {
            action: DocumentAction::Closing,
            ..
        }
    ) || event.command_id() == Some(CLOSE_COMMAND)
}

impl FileInteractionTransformer {
    pub const fn new(timeout: TimeDelta) -> Self {
        Self {
            timeout,
            current: None,
            debugging: false,
            closed: Vec::new(),
        }
    }

    fn close_current(&mut self, context: &TransformerContext) {
        if let Some(open) = self.current.take() {
            let file_type = DocumentType::classify(&open.file);
            self.closed.push(open.span.close(
                context,
                IntervalKind::FileInteraction {
                    file_name: open.file,
                    file_type,
                    interaction: open.interaction,
                },
            ));
        }
    }

    /// Interaction type the event implies for `file`, or `None` when the
    /// event says nothing about the file.
    fn classify(&self, event: &Event, file: &str) -> Option<FileInteractionType> {
        let continuing = self
            .current
            .as_ref()
            .filter(|open| open.file == file)
            .map(|open| open.interaction);

        match &event.kind {
            EventKind::Edit { .. } if self.debugging => None,
            EventKind::Edit { .. }
            | EventKind::Completion(_)
            | EventKind::Document {
                action: DocumentAction::Saved,
                ..
            } => Some(FileInteractionType::Typing),
            EventKind::Document { .. } | EventKind::Build { .. } | EventKind::Debugger { .. } => {
                Some(FileInteractionType::Reading)
            }
            EventKind::Command { command_id } => {
                if TYPING_COMMAND_PREFIXES
                    .iter()
                    .any(|prefix| command_id.starts_with(prefix))
                {
                    Some(FileInteractionType::Typing)
                } else {
                    Some(continuing.unwrap_or(FileInteractionType::Reading))
                }
            }
            EventKind::Window { window, .. } => (window == file_name(file))
                .then(|| continuing.unwrap_or(FileInteractionType::Reading)),
            EventKind::Navigation { .. } => {
                Some(continuing.unwrap_or(FileInteractionType::Reading))
            }
            EventKind::Activity => continuing,
            _ => None,
        }
    }
}

impl IntervalTransformer for FileInteractionTransformer {
    fn name(&self) -> &'static str {
        "file_interaction"
    }

    fn process_event(&mut self, event: &Event, context: &TransformerContext) {
        let Some((start, end)) = event.span() else {
            return;
        };

        if let EventKind::Debugger { mode, .. } = &event.kind {
            self.debugging = !matches!(mode, DebuggerMode::Design);
        }

        if self
            .current
            .as_ref()
            .is_some_and(|open| start - open.span.end > self.timeout)
        {
            self.close_current(context);
        }

        if matches!(
            event.kind,
            EventKind::TestRun(_)
                | EventKind::IdeState {
                    phase: IdePhase::Shutdown
                }
        ) {
            self.close_current(context);
            return;
        }

        let Some(file) = subject(event) else {
            return;
        };
        let same_file = self.current.as_ref().is_some_and(|open| open.file == file);

        if is_close(event) {
            if same_file {
                if let Some(open) = &mut self.current {
                    open.span.extend_to(start);
                }
                self.close_current(context);
            }
            return;
        }

        if same_file
            && matches!(
                event.kind,
                EventKind::Document {
                    action: DocumentAction::Opened,
                    ..
                }
            )
        {
            tracing::debug!(file, "document opened while open, closing and reopening");
            self.close_current(context);
        }

        let Some(interaction) = self.classify(event, file) else {
            return;
        };

        match &mut self.current {
            Some(open) if open.file == file && open.interaction == interaction => {
                open.span.extend_to(end);
                return;
            }
            _ => {}
        }

        let open_start = match &self.current {
            Some(open) if open.file == file => start.max(open.span.end),
            _ => start,
        };
        self.close_current(context);
        let mut span = OpenSpan::open(event, open_start, context);
        span.extend_to(end);
        self.current = Some(OpenFile {
            file: file.to_string(),
            interaction,
            span,
        });
    }

    fn signal_end_of_stream(
        &mut self,
        stream_end: DateTime<Utc>,
        context: &TransformerContext,
    ) -> Vec<Interval> {
        if let Some(open) = &mut self.current {
            open.span.extend_to(stream_end);
        }
        self.close_current(context);
        std::mem::take(&mut self.closed)
    }
}
