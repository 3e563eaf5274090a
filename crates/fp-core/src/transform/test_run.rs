use chrono::{DateTime, TimeDelta, Utc};

use super::{IntervalTransformer, OpenSpan, TransformerContext};
use crate::event::{Event, EventKind, TestResult, TestRun};
use crate::interval::{
    Interval, IntervalKind, TestClassResult, TestMethodResult, TestRunSummary,
};

/// Turns every test run event into one interval.
#[derive(Debug, Default)]
pub struct TestRunTransformer {
    closed: Vec<Interval>,
}

/// Groups results by class, keeping classes in order of first appearance.
///
/// `None` when a class duration is out of range.
fn summarize(run: &TestRun) -> Option<TestRunSummary> {
    let mut classes: Vec<TestClassResult> = Vec::new();
    let mut result = TestResult::Unknown;

    for test in &run.tests {
        let (class, method) = test.class_and_method();
        result = result.combine(test.result);

        let index = match classes.iter().position(|c| c.name == class) {
            Some(index) => index,
            None => {
                classes.push(TestClassResult {
                    name: class.to_string(),
                    duration: TimeDelta::zero(),
                    result: TestResult::Unknown,
                    methods: Vec::new(),
                });
                classes.len() - 1
            }
        };
        let entry = &mut classes[index];
        entry.duration = entry.duration.checked_add(&test.duration)?;
        entry.result = entry.result.combine(test.result);
        entry.methods.push(TestMethodResult {
            name: method.to_string(),
            parameters: test.parameters.clone(),
            duration: test.duration,
            result: test.result,
        });
    }

    Some(TestRunSummary {
        result,
        aborted: run.was_aborted,
        classes,
    })
}

impl IntervalTransformer for TestRunTransformer {
    fn name(&self) -> &'static str {
        "test_run"
    }

    fn process_event(&mut self, event: &Event, context: &TransformerContext) {
        let EventKind::TestRun(run) = &event.kind else {
            return;
        };
        let Some(start) = event.triggered_at else {
            return;
        };

        // A run lasts at least as long as its tests together.
        let tests_end = run
            .tests
            .iter()
            .try_fold(TimeDelta::zero(), |sum, test| sum.checked_add(&test.duration))
            .and_then(|total| start.checked_add_signed(total));
        let (Some(tests_end), Some(summary)) = (tests_end, summarize(run)) else {
            tracing::debug!(
                session = %event.session_id,
                "test durations out of range, skipping test run"
            );
            return;
        };
        let end = event.terminated_at.map_or(tests_end, |end| end.max(tests_end));
        let mut span = OpenSpan::open(event, start, context);
        span.extend_to(end);
        self.closed
            .push(span.close(context, IntervalKind::TestRun(summary)));
    }

    fn signal_end_of_stream(
        &mut self,
        _stream_end: DateTime<Utc>,
        _context: &TransformerContext,
    ) -> Vec<Interval> {
        std::mem::take(&mut self.closed)
    }
}
