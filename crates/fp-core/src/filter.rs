//! Ordered, stateless per-event filters.
//!
//! A filter sees one event at a time and either passes it through, rewrites
//! it, or drops it. Filters take `&self`, so they cannot carry state from one
//! event to the next.

use thiserror::Error;

use crate::event::Event;

/// A filter failed on an event. Fatal for the unit being processed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("filter '{filter}' failed: {message}")]
pub struct FilterError {
    pub filter: String,
    pub message: String,
}

impl FilterError {
    pub fn new(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            message: message.into(),
        }
    }
}

/// A single step of the filter chain.
pub trait EventFilter: Send + Sync {
    /// Human-readable name, used in stage reports.
    fn name(&self) -> String;

    /// Returns the (possibly rewritten) event, or `None` to drop it.
    fn apply(&self, event: Event) -> Result<Option<Event>, FilterError>;
}

/// Adapts a closure into an [`EventFilter`].
pub struct FnFilter<F> {
    name: String,
    func: F,
}

impl<F> FnFilter<F>
where
    F: Fn(Event) -> Result<Option<Event>, FilterError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> EventFilter for FnFilter<F>
where
    F: Fn(Event) -> Result<Option<Event>, FilterError> + Send + Sync,
{
    fn name(&self) -> String {
        self.name.clone()
    }

    fn apply(&self, event: Event) -> Result<Option<Event>, FilterError> {
        (self.func)(event)
    }
}

/// Filters applied in registration order.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn EventFilter>>,
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter and returns the chain, for building in one expression.
    #[must_use]
    pub fn with(mut self, filter: impl EventFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    pub fn push(&mut self, filter: impl EventFilter + 'static) -> &mut Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Runs one event through every filter. The first filter that drops the
    /// event stops the chain.
    pub fn apply_one(&self, event: Event) -> Result<Option<Event>, FilterError> {
        let mut current = event;
        for filter in &self.filters {
            match filter.apply(current)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Runs a whole batch through the chain, one filter at a time.
    ///
    /// Because filters are stateless this gives the same result as
    /// [`Self::apply_one`] per event, and it lets `on_stage` observe the number
    /// of surviving events after each filter.
    pub fn apply<F>(&self, events: Vec<Event>, mut on_stage: F) -> Result<Vec<Event>, FilterError>
    where
        F: FnMut(&str, usize),
    {
        let mut current = events;
        for filter in &self.filters {
            let name = filter.name();
            let mut kept = Vec::with_capacity(current.len());
            for event in current {
                if let Some(event) = filter.apply(event)? {
                    kept.push(event);
                }
            }
            tracing::debug!(filter = %name, remaining = kept.len(), "applied filter");
            on_stage(&name, kept.len());
            current = kept;
        }
        Ok(current)
    }
}
