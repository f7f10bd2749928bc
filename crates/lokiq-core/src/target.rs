//! Target builder: turns a caller's [`RawQuery`] into a [`QueryTarget`].

use crate::error::QueryError;
use crate::expr::{self, Interpolate, TemplateVars};
use crate::time::{millis_to_ns, TimeRange, TimeResolver};
use crate::types::{Direction, ExecutionMode, QueryTarget, RawQuery};
use std::sync::Arc;
use std::time::Duration;

/// Builds backend-ready targets. Cheap to clone; shared between the executor
/// and every live tick.
#[derive(Clone)]
pub struct TargetBuilder {
    max_lines: usize,
    live_window: Duration,
    resolver: TimeResolver,
    interpolator: Arc<dyn Interpolate>,
}

impl TargetBuilder {
    pub fn new(max_lines: usize, live_window: Duration, resolver: TimeResolver) -> Self {
        Self {
            max_lines,
            live_window,
            resolver,
            interpolator: Arc::new(TemplateVars::default()),
        }
    }

    pub fn with_interpolator(mut self, interpolator: Arc<dyn Interpolate>) -> Self {
        self.interpolator = interpolator;
        self
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn resolver(&self) -> &TimeResolver {
        &self.resolver
    }

    /// Build the target for `query`.
    ///
    /// In [`ExecutionMode::Live`] the window is `[now - live_window, now]` and
    /// `range` is ignored. Otherwise `range.from` rounds down and `range.to`
    /// rounds up. The limit is always the configured `max_lines`.
    pub fn build(
        &self,
        query: &RawQuery,
        range: &TimeRange,
        mode: ExecutionMode,
    ) -> Result<QueryTarget, QueryError> {
        let mut expression = self.interpolator.interpolate(&query.expression);
        if let Some(action) = &query.action {
            expression = expr::apply_action(&expression, action);
        }
        let parsed = expr::parse_query(&expression);

        let (start_ns, end_ns) = match mode {
            ExecutionMode::Live => {
                let end_ns = millis_to_ns(self.resolver.clock().now())?;
                let window_ns = i64::try_from(self.live_window.as_nanos()).unwrap_or(i64::MAX);
                (end_ns.saturating_sub(window_ns), end_ns)
            }
            ExecutionMode::Historical => (
                self.resolver.resolve(&range.from, false)?,
                self.resolver.resolve(&range.to, true)?,
            ),
        };
        if start_ns >= end_ns {
            return Err(QueryError::InvalidTimeRange { start_ns, end_ns });
        }

        Ok(QueryTarget {
            ref_id: query.ref_id.clone(),
            selector: parsed.selector,
            regexp: parsed.regexp,
            direction: Direction::Backward,
            limit: self.max_lines,
            start_ns,
            end_ns,
        })
    }
}
