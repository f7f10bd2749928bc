//! Stream merger: combines per-label-set streams into one [`LogsModel`].
//!
//! Rows from every stream are flattened, exact duplicates (same labels,
//! timestamp and line) are dropped, and the remainder is stably sorted by
//! timestamp so ties keep their stream-then-entry input order. Series are
//! computed from the full row set before the `max_lines` cap is applied.

use crate::labels::Labels;
use crate::types::{Direction, LogRow, LogStream, LogsModel, SeriesLine, SeriesPoint};
use std::collections::{BTreeMap, HashSet};

/// Parameters of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    pub max_lines: usize,
    pub direction: Direction,
    /// Bucket width for series; `None` outside time-series mode.
    pub series_interval_ms: Option<u64>,
}

impl MergeOptions {
    pub fn new(max_lines: usize) -> Self {
        Self {
            max_lines,
            direction: Direction::Backward,
            series_interval_ms: None,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn series(mut self, interval_ms: u64) -> Self {
        self.series_interval_ms = Some(interval_ms);
        self
    }
}

/// Merge `streams` into a single ordered, capped model.
pub fn merge_streams(streams: &[LogStream], opts: &MergeOptions) -> LogsModel {
    let common_labels = Labels::common(
        streams
            .iter()
            .filter(|s| !s.entries.is_empty())
            .map(|s| &s.labels),
    );

    let mut seen: HashSet<(&Labels, i64, &str)> = HashSet::new();
    let mut rows: Vec<LogRow> = Vec::with_capacity(streams.iter().map(|s| s.entries.len()).sum());
    for stream in streams {
        for entry in &stream.entries {
            if !seen.insert((&stream.labels, entry.timestamp_ns, entry.line.as_str())) {
                continue;
            }
            rows.push(LogRow {
                timestamp_ns: entry.timestamp_ns,
                line: entry.line.clone(),
                labels: stream.labels.clone(),
                search_filter_tag: stream.search_filter_tag.clone(),
            });
        }
    }
    let duplicates = seen.len().abs_diff(streams.iter().map(|s| s.entries.len()).sum());

    match opts.direction {
        Direction::Backward => rows.sort_by(|a, b| b.timestamp_ns.cmp(&a.timestamp_ns)),
        Direction::Forward => rows.sort_by(|a, b| a.timestamp_ns.cmp(&b.timestamp_ns)),
    }

    let series = opts
        .series_interval_ms
        .map(|interval| make_series(&rows, interval))
        .unwrap_or_default();

    let total = rows.len();
    rows.truncate(opts.max_lines);

    tracing::debug!(
        streams = streams.len(),
        rows = total,
        kept = rows.len(),
        duplicates,
        series = series.len(),
        "merged streams"
    );

    LogsModel {
        rows,
        series,
        common_labels,
    }
}

/// Count `rows` per label set in fixed `interval_ms` buckets.
///
/// Lines are ordered by their label string and points ascend by time. Only
/// buckets containing at least one row are emitted. An interval of zero is
/// treated as one millisecond.
pub fn make_series(rows: &[LogRow], interval_ms: u64) -> Vec<SeriesLine> {
    let interval = i64::try_from(interval_ms.max(1)).unwrap_or(i64::MAX);
    let mut buckets: BTreeMap<String, BTreeMap<i64, u64>> = BTreeMap::new();
    for row in rows {
        let ts_ms = row.timestamp_ns.div_euclid(1_000_000);
        let bucket = ts_ms.div_euclid(interval) * interval;
        *buckets
            .entry(row.labels.to_string())
            .or_default()
            .entry(bucket)
            .or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|(target, points)| SeriesLine {
            target,
            datapoints: points
                .into_iter()
                .map(|(timestamp_ms, count)| SeriesPoint { timestamp_ms, count })
                .collect(),
        })
        .collect()
}
