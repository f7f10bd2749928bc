//! Core types for lokiq-core.
//!
//! This module defines the data shared across the pipeline: the caller's
//! [`RawQuery`], the backend-ready [`QueryTarget`], the returned
//! [`LogStream`]s and the merged [`LogsModel`].

use crate::labels::Labels;
use serde::{Deserialize, Serialize};

/// How the caller wants a batch of results presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Aggregated per-label-set count series.
    TimeSeries,
    /// Individual log rows.
    #[default]
    Logs,
}

/// Whether a batch runs once against the requested range or keeps polling a
/// trailing window anchored at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    #[default]
    Historical,
    Live,
}

/// Ordering of log rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Newest first.
    #[default]
    Backward,
    /// Oldest first.
    Forward,
}

impl Direction {
    /// Value of the backend's `direction` query parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            Direction::Backward => "BACKWARD",
            Direction::Forward => "FORWARD",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_param())
    }
}

/// A programmatic edit applied to a query's selector before it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryAction {
    /// Add (or replace) a `key="value"` matcher in the selector.
    AddFilter { key: String, value: String },
}

/// A query exactly as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawQuery {
    /// Caller-chosen identity, attached to failures for this target.
    pub ref_id: String,
    /// Selector plus optional regexp filter, e.g. `{job="api"} timeout`.
    pub expression: String,
    pub display_mode: DisplayMode,
    /// Excluded from execution but kept for positional alignment.
    #[serde(default)]
    pub suppressed: bool,
    #[serde(default)]
    pub action: Option<QueryAction>,
}

impl RawQuery {
    pub fn new(ref_id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            ref_id: ref_id.into(),
            expression: expression.into(),
            ..Default::default()
        }
    }

    pub fn display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    pub fn suppressed(mut self, suppressed: bool) -> Self {
        self.suppressed = suppressed;
        self
    }

    pub fn action(mut self, action: QueryAction) -> Self {
        self.action = Some(action);
        self
    }

    /// True when the query should never reach the backend.
    pub fn is_skipped(&self) -> bool {
        self.suppressed || self.expression.trim().is_empty()
    }
}

/// The decomposed form of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedSelector {
    /// Label selector including braces, e.g. `{job="api"}`. Empty if absent.
    pub selector: String,
    /// Free-text regexp filter following the selector. Empty if absent.
    pub regexp: String,
}

/// A fully specified backend query. Only [`TargetBuilder`](crate::TargetBuilder)
/// constructs these, which guarantees `start_ns < end_ns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    pub ref_id: String,
    pub selector: String,
    pub regexp: String,
    pub direction: Direction,
    pub limit: usize,
    pub start_ns: i64,
    pub end_ns: i64,
}

impl QueryTarget {
    /// The expression sent as the `query` parameter.
    pub fn expression(&self) -> String {
        crate::expr::format_query(&self.selector, &self.regexp)
    }

    /// Query-string parameters for `GET /api/prom/query`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        vec![
            ("query".to_string(), self.expression()),
            ("limit".to_string(), self.limit.to_string()),
            ("start".to_string(), self.start_ns.to_string()),
            ("end".to_string(), self.end_ns.to_string()),
            ("direction".to_string(), self.direction.as_param().to_string()),
            ("regexp".to_string(), self.regexp.clone()),
        ]
    }
}

/// One log line inside a [`LogStream`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_ns: i64,
    pub line: String,
}

impl LogEntry {
    pub fn new(timestamp_ns: i64, line: impl Into<String>) -> Self {
        Self {
            timestamp_ns,
            line: line.into(),
        }
    }
}

/// A backend-returned sequence of entries sharing one label set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogStream {
    pub labels: Labels,
    pub entries: Vec<LogEntry>,
    /// Regexp filter of the target that produced this stream.
    pub search_filter_tag: String,
}

/// A flattened, globally ordered log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRow {
    pub timestamp_ns: i64,
    pub line: String,
    pub labels: Labels,
    pub search_filter_tag: String,
}

impl LogRow {
    /// Byte ranges of `line` matched by the row's filter tag, for highlighting.
    ///
    /// An empty tag or one that is not a valid regex yields no matches.
    pub fn search_matches(&self) -> Vec<std::ops::Range<usize>> {
        if self.search_filter_tag.is_empty() {
            return Vec::new();
        }
        match regex::Regex::new(&self.search_filter_tag) {
            Ok(re) => re.find_iter(&self.line).map(|m| m.range()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// One time bucket of a [`SeriesLine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub timestamp_ms: i64,
    pub count: u64,
}

/// Row counts over time for a single label set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesLine {
    /// The label set rendered as `{k="v", ...}`.
    pub target: String,
    /// Ascending by `timestamp_ms`.
    pub datapoints: Vec<SeriesPoint>,
}

/// The merged result of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LogsModel {
    pub rows: Vec<LogRow>,
    /// Only populated in time-series mode.
    pub series: Vec<SeriesLine>,
    /// Labels present with the same value on every contributing stream.
    pub common_labels: Labels,
}

impl LogsModel {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.series.is_empty()
    }
}
