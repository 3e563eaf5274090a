//! Per-unit orchestration of cleaning, interval extraction and completion merging.
//!
//! For one unit the stages run strictly in sequence:
//!
//! 1. filter chain
//! 2. deduplication
//! 3. ordering
//! 4. transformers and completion merging, both over the cleaned stream
//!
//! Units are independent and are processed in parallel by
//! [`Pipeline::process_units`]. A failing unit does not stop the others, and
//! no partial output is produced for it.

use std::fmt;
use std::sync::Mutex;

use rayon::prelude::*;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::dedup::deduplicate;
use crate::event::Event;
use crate::filter::{FilterChain, FilterError};
use crate::interval::Interval;
use crate::merge::{CompletionSession, merge_completions};
use crate::order::{self, OrderingError, OrderingMode};
use crate::source::{EventSource, SourceError};
use crate::transform::{TransformerConfig, TransformerContext, TransformerRegistry, transform};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unit '{unit}': {source}")]
    Filter { unit: String, source: FilterError },

    #[error("unit '{unit}': {source}")]
    Ordering { unit: String, source: OrderingError },

    #[error("unit '{unit}': {source}")]
    Source { unit: String, source: SourceError },
}

impl PipelineError {
    pub fn unit(&self) -> &str {
        match self {
            Self::Filter { unit, .. } | Self::Ordering { unit, .. } | Self::Source { unit, .. } => {
                unit
            }
        }
    }
}

/// A point in the cleaning stages at which the event count is reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    BeforeFilters,
    AfterFilter(String),
    AfterDeduplication,
    AfterOrdering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeFilters => f.write_str("before applying any filter"),
            Self::AfterFilter(name) => write!(f, "after applying '{name}'"),
            Self::AfterDeduplication => f.write_str("after removing duplicates"),
            Self::AfterOrdering => f.write_str("after ordering"),
        }
    }
}

impl Serialize for Stage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: Stage,
    pub count: usize,
}

/// Event counts per stage, in the order the stages ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StageCounts(Vec<StageCount>);

impl StageCounts {
    pub fn push(&mut self, stage: Stage, count: usize) {
        self.0.push(StageCount { stage, count });
    }

    pub fn get(&self, stage: &Stage) -> Option<usize> {
        self.0.iter().find(|s| &s.stage == stage).map(|s| s.count)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageCount> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Side channel for progress reporting. Never affects the results.
pub trait PipelineObserver: Sync {
    fn unit_started(&self, _unit: &str) {}

    fn stage_completed(&self, unit: &str, stage: &Stage, count: usize);

    fn unit_finished(&self, _unit: &str, _output: &UnitOutput) {}

    fn unit_failed(&self, _unit: &str, _error: &PipelineError) {}
}

/// Reports progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn unit_started(&self, unit: &str) {
        tracing::debug!(unit, "processing unit");
    }

    fn stage_completed(&self, unit: &str, stage: &Stage, count: usize) {
        tracing::info!(unit, %stage, count, "stage completed");
    }

    fn unit_finished(&self, unit: &str, output: &UnitOutput) {
        tracing::info!(
            unit,
            events = output.events.len(),
            intervals = output.intervals.len(),
            completions = output.completions.len(),
            "unit processed"
        );
    }

    fn unit_failed(&self, unit: &str, error: &PipelineError) {
        tracing::error!(unit, error = %error, "unit failed");
    }
}

/// Records every stage report, for tests and summaries.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    stages: Mutex<Vec<(String, String, usize)>>,
}

impl RecordingObserver {
    /// `(unit, stage, count)` in report order.
    pub fn stages(&self) -> Vec<(String, String, usize)> {
        self.stages
            .lock()
            .map(|stages| stages.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl PipelineObserver for RecordingObserver {
    fn stage_completed(&self, unit: &str, stage: &Stage, count: usize) {
        let mut stages = self
            .stages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        stages.push((unit.to_string(), stage.to_string(), count));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// How the cleaning stage orders events. Transformers and the
    /// completion merger always require ordered input.
    pub ordering: OrderingMode,
    pub transformers: TransformerConfig,
}

/// The raw events of one logical unit, e.g. one developer archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventUnit {
    pub name: String,
    pub events: Vec<Event>,
}

impl EventUnit {
    pub fn new(name: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            name: name.into(),
            events,
        }
    }
}

/// Everything produced for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutput {
    pub name: String,
    /// Filtered, deduplicated, ordered events.
    pub events: Vec<Event>,
    /// Intervals with a non-zero duration.
    pub intervals: Vec<Interval>,
    pub completions: Vec<CompletionSession>,
    pub counts: StageCounts,
}

/// Outcome of one unit in a batch.
#[derive(Debug)]
pub struct UnitReport {
    pub unit: String,
    pub result: Result<UnitOutput, PipelineError>,
}

#[derive(Debug, Default)]
pub struct Pipeline {
    filters: FilterChain,
    registry: TransformerRegistry,
    config: PipelineConfig,
}

impl Pipeline {
    pub const fn new(
        filters: FilterChain,
        registry: TransformerRegistry,
        config: PipelineConfig,
    ) -> Self {
        Self {
            filters,
            registry,
            config,
        }
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs filter chain, deduplication and ordering over one unit.
    pub fn clean(
        &self,
        unit: &str,
        events: Vec<Event>,
        observer: &dyn PipelineObserver,
    ) -> Result<(Vec<Event>, StageCounts), PipelineError> {
        let mut counts = StageCounts::default();
        let mut report = |stage: Stage, count: usize| {
            observer.stage_completed(unit, &stage, count);
            counts.push(stage, count);
        };

        report(Stage::BeforeFilters, events.len());
        let filtered = self
            .filters
            .apply(events, |name, count| {
                report(Stage::AfterFilter(name.to_string()), count);
            })
            .map_err(|source| PipelineError::Filter {
                unit: unit.to_string(),
                source,
            })?;

        let unique = deduplicate(filtered);
        report(Stage::AfterDeduplication, unique.len());

        let ordered =
            order::apply(self.config.ordering, unique).map_err(|source| PipelineError::Ordering {
                unit: unit.to_string(),
                source,
            })?;
        report(Stage::AfterOrdering, ordered.len());

        Ok((ordered, counts))
    }

    /// Runs every stage over one unit.
    pub fn process_unit(
        &self,
        unit: EventUnit,
        observer: &dyn PipelineObserver,
    ) -> Result<UnitOutput, PipelineError> {
        let EventUnit { name, events } = unit;
        let (events, counts) = self.clean(&name, events, observer)?;

        let ordering_error = |source| PipelineError::Ordering {
            unit: name.clone(),
            source,
        };
        let context = TransformerContext::new(name.as_str());
        let mut intervals = transform(&self.registry, &self.config.transformers, context, &events)
            .map_err(ordering_error)?;
        let produced = intervals.len();
        intervals.retain(|interval| !interval.is_empty());
        if intervals.len() < produced {
            tracing::debug!(
                unit = %name,
                dropped = produced - intervals.len(),
                "dropped zero-duration intervals"
            );
        }

        let completions = merge_completions(&events).map_err(ordering_error)?;

        Ok(UnitOutput {
            name,
            events,
            intervals,
            completions,
            counts,
        })
    }

    fn run_unit(&self, unit: EventUnit, observer: &dyn PipelineObserver) -> UnitReport {
        observer.unit_started(&unit.name);
        let name = unit.name.clone();
        let result = self.process_unit(unit, observer);
        match &result {
            Ok(output) => observer.unit_finished(&name, output),
            Err(error) => observer.unit_failed(&name, error),
        }
        UnitReport { unit: name, result }
    }

    /// Processes units in parallel. Reports come back in input order.
    pub fn process_units(
        &self,
        units: Vec<EventUnit>,
        observer: &dyn PipelineObserver,
    ) -> Vec<UnitReport> {
        units
            .into_par_iter()
            .map(|unit| self.run_unit(unit, observer))
            .collect()
    }

    /// Reads every unit of `source` and processes them in parallel.
    ///
    /// Failing to list the units is fatal; failing to read one unit only
    /// fails that unit.
    pub fn process_source<S>(
        &self,
        source: &S,
        observer: &dyn PipelineObserver,
    ) -> Result<Vec<UnitReport>, SourceError>
    where
        S: EventSource + ?Sized,
    {
        let units = source.units()?;
        tracing::info!(units = units.len(), "processing units");

        Ok(units
            .into_par_iter()
            .map(|unit| match source.read_unit(&unit) {
                Ok(events) => self.run_unit(EventUnit::new(unit, events), observer),
                Err(err) => {
                    let error = PipelineError::Source {
                        unit: unit.clone(),
                        source: err,
                    };
                    observer.unit_failed(&unit, &error);
                    UnitReport {
                        unit,
                        result: Err(error),
                    }
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FnFilter;
    use crate::filters::DropCommands;
    use crate::interval::IntervalKind;
    use crate::source::MemorySource;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 8, 19, 19, 0, 0).unwrap() + TimeDelta::seconds(seconds)
    }

    fn e(id: &str, seconds: i64) -> Event {
        Event::command(id).at(ts(seconds))
    }

    fn pipeline_dropping(ids: &[&str]) -> Pipeline {
        Pipeline::new(
            FilterChain::new().with(DropCommands::new(ids.iter().copied())),
            TransformerRegistry::with_defaults(),
            PipelineConfig::default(),
        )
    }

    #[test]
    fn stage_names_read_like_a_report() {
        assert_eq!(Stage::BeforeFilters.to_string(), "before applying any filter");
        assert_eq!(
            Stage::AfterFilter("command filter: b".into()).to_string(),
            "after applying 'command filter: b'"
        );
        assert_eq!(
            serde_json::to_string(&Stage::AfterDeduplication).unwrap(),
            r#""after removing duplicates""#
        );
    }

    #[test]
    fn cleaning_reports_counts_at_every_stage() {
        let pipeline = pipeline_dropping(&["b"]);
        let observer = RecordingObserver::default();

        let (events, counts) = pipeline
            .clean(
                "a",
                vec![e("a", 3), e("b", 2), e("c", 1), e("a", 3)],
                &observer,
            )
            .unwrap();

        assert_eq!(events, vec![e("c", 1), e("a", 3)]);
        let reported: Vec<_> = counts.iter().map(|s| (s.stage.to_string(), s.count)).collect();
        assert_eq!(
            reported,
            vec![
                ("before applying any filter".to_string(), 4),
                ("after applying 'command filter: b'".to_string(), 3),
                ("after removing duplicates".to_string(), 2),
                ("after ordering".to_string(), 2),
            ]
        );
        assert_eq!(observer.stages().len(), 4);
        assert_eq!(observer.stages()[0].0, "a");
    }

    #[test]
    fn zero_duration_intervals_are_dropped() {
        let pipeline = Pipeline::default();

        let output = pipeline
            .process_unit(EventUnit::new("dev-1", vec![e("a", 1)]), &TracingObserver)
            .unwrap();

        assert_eq!(output.events.len(), 1);
        assert!(output.intervals.is_empty());
    }

    #[test]
    fn intervals_and_completions_come_from_the_cleaned_stream() {
        let pipeline = Pipeline::default();
        let events = vec![e("b", 5), e("a", 0), e("a", 0)];

        let output = pipeline
            .process_unit(EventUnit::new("dev-1", events), &TracingObserver)
            .unwrap();

        assert_eq!(output.events, vec![e("a", 0), e("b", 5)]);
        assert!(output.completions.is_empty());
        let user_active = output
            .intervals
            .iter()
            .find(|i| i.kind == IntervalKind::UserActive)
            .unwrap();
        assert_eq!(user_active.duration, TimeDelta::seconds(5));
        assert_eq!(user_active.user_id, "dev-1");
    }

    #[test]
    fn strict_ordering_fails_the_unit() {
        let pipeline = Pipeline::new(
            FilterChain::new(),
            TransformerRegistry::with_defaults(),
            PipelineConfig {
                ordering: OrderingMode::Strict,
                ..PipelineConfig::default()
            },
        );

        let err = pipeline
            .process_unit(
                EventUnit::new("dev-1", vec![e("a", 2), e("b", 1)]),
                &TracingObserver,
            )
            .unwrap_err();

        assert_eq!(err.unit(), "dev-1");
        assert!(matches!(err, PipelineError::Ordering { .. }));
    }

    fn oversized_test_run(seconds: i64) -> Event {
        Event::new(crate::EventKind::TestRun(crate::TestRun {
            was_aborted: false,
            tests: vec![crate::TestCaseResult {
                test_method: "Shop.Tests.CartTest.Adds".to_string(),
                parameters: String::new(),
                start_time: None,
                duration: TimeDelta::milliseconds(10_000_000_000_000_000),
                result: crate::TestResult::Success,
            }],
        }))
        .at(ts(seconds))
    }

    #[test]
    fn out_of_range_test_duration_stays_within_its_unit() {
        let units = || {
            vec![
                EventUnit::new("good", vec![e("a", 1), e("b", 5)]),
                EventUnit::new("huge", vec![e("a", 1), oversized_test_run(2), e("b", 5)]),
            ]
        };

        let unfiltered = Pipeline::default().process_units(units(), &TracingObserver);
        let huge = unfiltered[1].result.as_ref().unwrap();
        assert!(unfiltered[0].result.is_ok());
        assert!(
            huge.intervals
                .iter()
                .all(|i| !matches!(i.kind, IntervalKind::TestRun(_)))
        );

        let timing = Pipeline::new(
            FilterChain::new().with(crate::filters::TimeTestResults),
            TransformerRegistry::with_defaults(),
            PipelineConfig::default(),
        );
        let filtered = timing.process_units(units(), &TracingObserver);
        assert!(filtered[0].result.is_ok());
        assert!(matches!(
            filtered[1].result,
            Err(PipelineError::Filter { .. })
        ));
    }

    #[test]
    fn failing_unit_does_not_stop_the_others() {
        let exploding = FnFilter::new("explodes on boom", |event: Event| {
            if event.command_id() == Some("boom") {
                Err(FilterError::new("explodes on boom", "cannot handle"))
            } else {
                Ok(Some(event))
            }
        });
        let pipeline = Pipeline::new(
            FilterChain::new().with(exploding),
            TransformerRegistry::with_defaults(),
            PipelineConfig::default(),
        );
        let units = vec![
            EventUnit::new("good-1", vec![e("a", 1), e("b", 2)]),
            EventUnit::new("bad", vec![e("boom", 1)]),
            EventUnit::new("good-2", vec![e("c", 1)]),
        ];

        let reports = pipeline.process_units(units, &TracingObserver);

        let outcome: Vec<_> = reports
            .iter()
            .map(|r| (r.unit.as_str(), r.result.is_ok()))
            .collect();
        assert_eq!(outcome, vec![("good-1", true), ("bad", false), ("good-2", true)]);
        let err = reports[1].result.as_ref().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unit 'bad': filter 'explodes on boom' failed: cannot handle"
        );
    }

    #[test]
    fn unreadable_unit_is_reported_per_unit() {
        struct Flaky;

        impl EventSource for Flaky {
            fn units(&self) -> Result<Vec<String>, SourceError> {
                Ok(vec!["ok".into(), "broken".into()])
            }

            fn read_unit(&self, unit: &str) -> Result<Vec<Event>, SourceError> {
                if unit == "broken" {
                    Err(SourceError::UnknownUnit(unit.to_string()))
                } else {
                    Ok(vec![Event::command("a").at(ts(0))])
                }
            }
        }

        let reports = Pipeline::default()
            .process_source(&Flaky, &TracingObserver)
            .unwrap();

        assert!(reports[0].result.is_ok());
        assert!(matches!(
            reports[1].result,
            Err(PipelineError::Source { .. })
        ));
    }

    #[test]
    fn memory_source_units_are_processed() {
        let source = MemorySource::new()
            .with_unit("dev-1", vec![e("a", 0), e("b", 3)])
            .with_unit("dev-2", Vec::new());

        let reports = Pipeline::default()
            .process_source(&source, &TracingObserver)
            .unwrap();

        let units: Vec<_> = reports.iter().map(|r| r.unit.as_str()).collect();
        assert_eq!(units, vec!["dev-1", "dev-2"]);
        assert!(reports.iter().all(|r| r.result.is_ok()));
    }
}
