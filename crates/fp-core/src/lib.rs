//! Core processing of IDE interaction logs.
//!
//! This crate contains the data model and the processing stages for:
//! - Cleaning: filter chain, deduplication and time ordering of raw events
//! - Intervals: per-activity state machines that turn events into time spans
//! - Completions: merging fragmented completion events into one session per popup
//! - Orchestration: running all of the above per unit, units in parallel

pub mod dedup;
pub mod event;
pub mod event_type;
pub mod filter;
pub mod filters;
pub mod interval;
pub mod merge;
pub mod order;
pub mod pipeline;
pub mod source;
mod time;
pub mod transform;

pub use dedup::deduplicate;
pub use event::{
    Completion, DebuggerMode, DocumentAction, Event, EventKind, IdePhase, Proposal,
    ProposalSelection, SolutionAction, TerminationState, TestCaseResult, TestResult, TestRun,
    Trigger, WindowAction,
};
pub use event_type::{EventType, UnknownEventType};
pub use filter::{EventFilter, FilterChain, FilterError, FnFilter};
pub use interval::{
    DocumentType, FileInteractionType, Interval, IntervalKind, PerspectiveType, TestClassResult,
    TestMethodResult, TestRunSummary,
};
pub use merge::{CompletionMerger, CompletionSession, are_mergeable, merge, merge_completions};
pub use order::{OrderingError, OrderingMode, ensure_ordered, is_ordered, order};
pub use pipeline::{
    EventUnit, Pipeline, PipelineConfig, PipelineError, PipelineObserver, RecordingObserver,
    Stage, StageCount, StageCounts, TracingObserver, UnitOutput, UnitReport,
};
pub use source::{
    CompletionSink, EventSink, EventSource, IntervalSink, MemorySink, MemorySource, SourceError,
};
pub use transform::{
    IntervalTransformer, TransformerConfig, TransformerContext, TransformerRegistry,
    TransformerSet, transform,
};
