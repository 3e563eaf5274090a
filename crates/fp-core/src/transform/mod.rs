//! Event-to-interval transformers.
//!
//! Each transformer is a small state machine for one activity family. A
//! [`TransformerSet`] hands every event of an ordered stream to every
//! transformer in a single pass, then flushes them once at the end.
//!
//! # Open intervals
//!
//! A transformer keeps an [`OpenSpan`] per subject it tracks. The span only
//! becomes an [`Interval`] when it is closed by an end event, by a timeout, or
//! by the end-of-stream flush. A second start event for a subject that is
//! already open closes the current span and opens a new one.

mod file_interaction;
mod ide_active;
mod ide_open;
mod perspective;
mod test_run;
mod user_active;

use chrono::{DateTime, TimeDelta, Utc};

use crate::event::{Event, EventKind, SolutionAction};
use crate::interval::{Interval, IntervalKind};
use crate::order::OrderingError;

pub use file_interaction::FileInteractionTransformer;
pub use ide_active::IdeActiveTransformer;
pub use ide_open::IdeOpenTransformer;
pub use perspective::PerspectiveTransformer;
pub use test_run::TestRunTransformer;
pub use user_active::UserActiveTransformer;

/// Knobs shared by all transformers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformerConfig {
    /// Gap after which user and file activity is considered over.
    /// Default: 16 seconds.
    pub activity_timeout: TimeDelta,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            activity_timeout: TimeDelta::seconds(16),
        }
    }
}

/// Stream-wide facts that transformers read but do not own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformerContext {
    pub user_id: String,
    /// Solution opened most recently, empty when none is open.
    pub current_project: String,
    /// Latest tool version seen on the stream.
    pub tool_version: Option<String>,
}

impl TransformerContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Updates the context from an event before transformers see it.
    pub fn observe(&mut self, event: &Event) {
        if let Some(version) = &event.tool_version {
            self.tool_version = Some(version.clone());
        }
        if let EventKind::Solution { action, target } = &event.kind {
            match action {
                SolutionAction::OpenSolution => self.current_project.clone_from(target),
                SolutionAction::CloseSolution => self.current_project.clear(),
                _ => {}
            }
        }
    }
}

/// State machine protocol every transformer implements.
pub trait IntervalTransformer: Send {
    fn name(&self) -> &'static str;

    /// Feeds one event of the ordered stream. Events the transformer does not
    /// understand, or that lack the timing it needs, are ignored.
    fn process_event(&mut self, event: &Event, context: &TransformerContext);

    /// Closes whatever is still open and returns every interval produced.
    /// Called exactly once, after the last event.
    fn signal_end_of_stream(
        &mut self,
        stream_end: DateTime<Utc>,
        context: &TransformerContext,
    ) -> Vec<Interval>;
}

/// The not-yet-closed part of an interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSpan {
    pub session_id: String,
    pub project: String,
    pub tool_version: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OpenSpan {
    pub fn open(event: &Event, start: DateTime<Utc>, context: &TransformerContext) -> Self {
        Self {
            session_id: event.session_id.clone(),
            project: context.current_project.clone(),
            tool_version: context
                .tool_version
                .clone()
                .or_else(|| event.tool_version.clone()),
            start,
            end: start,
        }
    }

    /// Moves the end forward. The end never moves backwards.
    pub fn extend_to(&mut self, time: DateTime<Utc>) {
        self.end = self.end.max(time);
    }

    pub fn close(self, context: &TransformerContext, kind: IntervalKind) -> Interval {
        Interval {
            start_time: self.start,
            duration: (self.end - self.start).max(TimeDelta::zero()),
            user_id: context.user_id.clone(),
            session_id: self.session_id,
            project: self.project,
            tool_version: self.tool_version,
            kind,
        }
    }
}

/// Builds a fresh transformer.
pub type TransformerFactory = fn(&TransformerConfig) -> Box<dyn IntervalTransformer>;

/// Named transformer constructors. A fresh set of transformers is built per
/// unit, so no state leaks between units.
#[derive(Debug, Clone)]
pub struct TransformerRegistry {
    factories: Vec<(&'static str, TransformerFactory)>,
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TransformerRegistry {
    /// A registry without any transformers.
    pub const fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("ide_open", |_| Box::new(IdeOpenTransformer::default()))
            .register("ide_active", |_| Box::new(IdeActiveTransformer::default()))
            .register("user_active", |config| {
                Box::new(UserActiveTransformer::new(config.activity_timeout))
            })
            .register("perspective", |_| Box::new(PerspectiveTransformer::default()))
            .register("file_interaction", |config| {
                Box::new(FileInteractionTransformer::new(config.activity_timeout))
            })
            .register("test_run", |_| Box::new(TestRunTransformer::default()));
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: TransformerFactory) -> &mut Self {
        self.factories.push((name, factory));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|(name, _)| *name).collect()
    }

    pub fn instantiate(&self, config: &TransformerConfig) -> Vec<Box<dyn IntervalTransformer>> {
        self.factories
            .iter()
            .map(|(_, factory)| factory(config))
            .collect()
    }
}

/// One set of live transformers driven over one ordered stream.
pub struct TransformerSet<'a> {
    transformers: Vec<Box<dyn IntervalTransformer>>,
    context: TransformerContext,
    previous: Option<&'a Event>,
    index: usize,
    stream_end: Option<DateTime<Utc>>,
}

impl<'a> TransformerSet<'a> {
    pub fn new(transformers: Vec<Box<dyn IntervalTransformer>>, context: TransformerContext) -> Self {
        Self {
            transformers,
            context,
            previous: None,
            index: 0,
            stream_end: None,
        }
    }

    /// Dispatches one event to every transformer.
    ///
    /// Fails if the event was triggered before the previous timed event.
    /// Events without a trigger time are skipped.
    pub fn process_event(&mut self, event: &'a Event) -> Result<(), OrderingError> {
        let index = self.index;
        self.index += 1;

        let Some((start, end)) = event.span() else {
            return Ok(());
        };
        if let Some(previous) = self.previous {
            if previous.triggered_at.is_some_and(|prev| start < prev) {
                return Err(OrderingError::new(index, previous, event));
            }
        }
        self.previous = Some(event);
        self.stream_end = Some(self.stream_end.map_or(end, |current| current.max(end)));

        self.context.observe(event);
        for transformer in &mut self.transformers {
            transformer.process_event(event, &self.context);
        }
        Ok(())
    }

    /// Flushes every transformer and returns all intervals ordered by start time.
    pub fn finish(mut self) -> Vec<Interval> {
        let Some(stream_end) = self.stream_end else {
            return Vec::new();
        };
        let mut intervals = Vec::new();
        for transformer in &mut self.transformers {
            let produced = transformer.signal_end_of_stream(stream_end, &self.context);
            tracing::debug!(
                transformer = transformer.name(),
                intervals = produced.len(),
                "flushed transformer"
            );
            intervals.extend(produced);
        }
        intervals.sort_by_key(|interval| interval.start_time);
        intervals
    }
}

/// Runs a fresh set of the registry's transformers over an ordered stream.
pub fn transform(
    registry: &TransformerRegistry,
    config: &TransformerConfig,
    context: TransformerContext,
    events: &[Event],
) -> Result<Vec<Interval>, OrderingError> {
    let mut set = TransformerSet::new(registry.instantiate(config), context);
    for event in events {
        set.process_event(event)?;
    }
    Ok(set.finish())
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    use super::{IntervalTransformer, TransformerContext};
    use crate::event::Event;
    use crate::interval::Interval;

    pub fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 8, 19, 19, 0, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    pub fn context() -> TransformerContext {
        TransformerContext::new("dev-1")
    }

    /// Feeds `events` with context tracking and flushes at the last event end.
    pub fn run(transformer: &mut dyn IntervalTransformer, events: &[Event]) -> Vec<Interval> {
        let end = events
            .iter()
            .filter_map(Event::end_time)
            .max()
            .unwrap_or_else(|| ts(0));
        run_until(transformer, events, end)
    }

    pub fn run_until(
        transformer: &mut dyn IntervalTransformer,
        events: &[Event],
        stream_end: DateTime<Utc>,
    ) -> Vec<Interval> {
        let mut context = context();
        for event in events {
            context.observe(event);
            transformer.process_event(event, &context);
        }
        transformer.signal_end_of_stream(stream_end, &context)
    }

    /// `(start second, duration seconds)` pairs, for compact assertions.
    pub fn spans(intervals: &[Interval]) -> Vec<(i64, i64)> {
        intervals
            .iter()
            .map(|i| ((i.start_time - ts(0)).num_seconds(), i.duration.num_seconds()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::ts;
    use super::*;
    use crate::event::{DocumentAction, IdePhase};

    fn solution(action: SolutionAction, target: &str) -> EventKind {
        EventKind::Solution {
            action,
            target: target.to_string(),
        }
    }

    #[test]
    fn context_tracks_project_and_version() {
        let mut context = TransformerContext::new("dev-1");

        let mut open = Event::new(solution(SolutionAction::OpenSolution, "Shop")).at(ts(0));
        open.tool_version = Some("0.1010".into());
        context.observe(&open);
        assert_eq!(context.current_project, "Shop");
        assert_eq!(context.tool_version.as_deref(), Some("0.1010"));

        context.observe(&Event::new(solution(SolutionAction::CloseSolution, "Shop")).at(ts(1)));
        assert_eq!(context.current_project, "");
        assert_eq!(context.tool_version.as_deref(), Some("0.1010"));
    }

    #[test]
    fn default_registry_lists_all_transformers() {
        let registry = TransformerRegistry::with_defaults();

        assert_eq!(
            registry.names(),
            vec![
                "ide_open",
                "ide_active",
                "user_active",
                "perspective",
                "file_interaction",
                "test_run"
            ]
        );
        let names: Vec<_> = registry
            .instantiate(&TransformerConfig::default())
            .iter()
            .map(|t| t.name())
            .collect();
        assert_eq!(names, registry.names());
    }

    #[test]
    fn out_of_order_event_aborts_the_set() {
        let events = vec![Event::command("a").at(ts(2)), Event::command("b").at(ts(1))];

        let err = transform(
            &TransformerRegistry::with_defaults(),
            &TransformerConfig::default(),
            TransformerContext::new("dev-1"),
            &events,
        )
        .unwrap_err();

        assert_eq!(err.index, 1);
        assert_eq!(err.later.command_id(), Some("b"));
    }

    #[test]
    fn untimed_events_are_skipped() {
        let events = vec![
            Event::command("a").at(ts(2)),
            Event::command("untimed"),
            Event::command("b").at(ts(3)),
        ];

        let intervals = transform(
            &TransformerRegistry::with_defaults(),
            &TransformerConfig::default(),
            TransformerContext::new("dev-1"),
            &events,
        )
        .unwrap();

        assert!(!intervals.is_empty());
    }

    #[test]
    fn empty_stream_produces_nothing() {
        let intervals = transform(
            &TransformerRegistry::with_defaults(),
            &TransformerConfig::default(),
            TransformerContext::new("dev-1"),
            &[],
        )
        .unwrap();

        assert!(intervals.is_empty());
    }

    #[test]
    fn every_transformer_sees_every_event() {
        let events = vec![
            Event::new(EventKind::IdeState {
                phase: IdePhase::Startup,
            })
            .at(ts(0))
            .in_session("ide-1"),
            Event::new(solution(SolutionAction::OpenSolution, "Shop"))
                .at(ts(1))
                .in_session("ide-1"),
            Event::document("src/Cart.cs", DocumentAction::Opened)
                .at(ts(2))
                .in_session("ide-1"),
            Event::new(EventKind::IdeState {
                phase: IdePhase::Shutdown,
            })
            .at(ts(10))
            .in_session("ide-1"),
        ];

        let intervals = transform(
            &TransformerRegistry::with_defaults(),
            &TransformerConfig::default(),
            TransformerContext::new("dev-1"),
            &events,
        )
        .unwrap();

        let labels: Vec<_> = intervals.iter().map(|i| i.kind.label()).collect();
        assert!(labels.contains(&"ide_open"));
        assert!(labels.contains(&"user_active"));
        assert!(labels.contains(&"perspective"));
        assert!(labels.contains(&"file_interaction"));
        assert!(intervals.windows(2).all(|w| w[0].start_time <= w[1].start_time));

        let file = intervals
            .iter()
            .find(|i| i.kind.label() == "file_interaction")
            .unwrap();
        assert_eq!(file.project, "Shop");
        assert_eq!(file.user_id, "dev-1");
    }

    #[test]
    fn span_never_has_negative_duration() {
        let event = Event::command("a").at(ts(5));
        let mut span = OpenSpan::open(&event, ts(5), &TransformerContext::default());
        span.extend_to(ts(3));

        let interval = span.close(&TransformerContext::default(), IntervalKind::UserActive);

        assert_eq!(interval.duration, TimeDelta::zero());
        assert_eq!(interval.start_time, ts(5));
    }
}
