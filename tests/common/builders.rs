//! Test builders: ergonomic constructors for streams, queries and wired-up
//! datasources.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use chrono::{DateTime, Utc};
use lokiq::{Labels, LogEntry, LogStream, LokiDatasource, RawQuery, TargetBuilder, TimeResolver, Transport};
use lokiq_client::HttpTransport;
use lokiq_core::config::Config;
use lokiq_core::time::{Clock, FixedClock, GrafanaDateMath};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// LogStreamBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`LogStream`] fixtures.
///
/// # Example
///
/// ```rust
/// let stream = LogStreamBuilder::new()
///     .label("job", "api")
///     .entry(100, "GET /healthz")
///     .tag("timeout")
///     .build();
/// ```
#[derive(Default)]
pub struct LogStreamBuilder {
    labels: Labels,
    entries: Vec<LogEntry>,
    tag: String,
}

impl LogStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, name: &str, value: &str) -> Self {
        self.labels.insert(name, value);
        self
    }

    pub fn entry(mut self, timestamp_ns: i64, line: &str) -> Self {
        self.entries.push(LogEntry::new(timestamp_ns, line));
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn build(self) -> LogStream {
        LogStream {
            labels: self.labels,
            entries: self.entries,
            search_filter_tag: self.tag,
        }
    }
}

/// A stream labelled `job=<job>` with one entry per timestamp, lines
/// `<job>-<index>`.
pub fn job_stream(job: &str, timestamps: &[i64]) -> LogStream {
    timestamps
        .iter()
        .enumerate()
        .fold(LogStreamBuilder::new().label("job", job), |b, (i, ts)| {
            b.entry(*ts, &format!("{job}-{i}"))
        })
        .build()
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub fn query(ref_id: &str, expression: &str) -> RawQuery {
    RawQuery::new(ref_id, expression)
}

pub fn suppressed(ref_id: &str, expression: &str) -> RawQuery {
    RawQuery::new(ref_id, expression).suppressed(true)
}

// ---------------------------------------------------------------------------
// Datasources
// ---------------------------------------------------------------------------

/// 2024-01-15T10:00:00Z, the "now" for tests that pin the clock.
pub fn test_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub const TEST_NOW_NS: i64 = 1_705_312_800_000_000_000;

/// A target builder with stock date math and the given clock.
pub fn target_builder(max_lines: usize, clock: Arc<dyn Clock>) -> TargetBuilder {
    TargetBuilder::new(
        max_lines,
        Duration::from_secs(1),
        TimeResolver::new(Arc::new(GrafanaDateMath), clock),
    )
}

/// A datasource over `transport` with "now" pinned to [`test_now`].
pub fn datasource_with(transport: Arc<dyn Transport>, max_lines: usize) -> LokiDatasource {
    let mut config = Config::defaults();
    config.datasource.max_lines = max_lines;
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(test_now()));
    LokiDatasource::with_parts(config, transport, target_builder(max_lines, clock))
}

/// A datasource talking HTTP to `base_url`.
pub fn http_datasource(base_url: &str, max_lines: usize) -> LokiDatasource {
    datasource_with(
        Arc::new(HttpTransport::new(base_url, Duration::from_secs(5))),
        max_lines,
    )
}
