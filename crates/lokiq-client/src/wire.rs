//! Backend wire format.
//!
//! `GET /api/prom/query` (and each message of `/api/prom/tail`) returns
//!
//! ```json
//! {"streams":[{"labels":"{job=\"api\"}","entries":[{"ts":"2024-01-15T10:00:00.123456789Z","line":"..."}]}]}
//! ```
//!
//! `GET /api/prom/label` returns `{"values":["job","env"]}`.

use lokiq_core::{Labels, LogEntry, LogStream, QueryError};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub streams: Vec<WireStream>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireStream {
    #[serde(default)]
    pub labels: String,
    #[serde(default)]
    pub entries: Vec<WireEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireEntry {
    #[serde(alias = "timestamp")]
    pub ts: String,
    pub line: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelValuesResponse {
    #[serde(default)]
    pub values: Vec<String>,
}

/// Decode a query body into streams tagged with `search_filter_tag`.
pub fn decode_streams(body: &[u8], search_filter_tag: &str) -> Result<Vec<LogStream>, QueryError> {
    let response: QueryResponse =
        serde_json::from_slice(body).map_err(|e| QueryError::Decode(e.to_string()))?;

    response
        .streams
        .into_iter()
        .map(|stream| {
            let labels: Labels = stream.labels.parse()?;
            let entries = stream
                .entries
                .into_iter()
                .map(|e| Ok(LogEntry::new(parse_timestamp(&e.ts)?, e.line)))
                .collect::<Result<Vec<_>, QueryError>>()?;
            Ok(LogStream {
                labels,
                entries,
                search_filter_tag: search_filter_tag.to_string(),
            })
        })
        .collect()
}

/// Decode a label-values body.
pub fn decode_label_values(body: &[u8]) -> Result<Vec<String>, QueryError> {
    serde_json::from_slice::<LabelValuesResponse>(body)
        .map(|r| r.values)
        .map_err(|e| QueryError::Decode(e.to_string()))
}

/// Entry timestamps arrive as RFC 3339 with nanosecond precision or as a
/// bare nanosecond epoch integer.
pub fn parse_timestamp(ts: &str) -> Result<i64, QueryError> {
    if let Ok(ns) = ts.parse::<i64>() {
        return Ok(ns);
    }
    chrono::DateTime::parse_from_rfc3339(ts)
        .ok()
        .and_then(|dt| dt.timestamp_nanos_opt())
        .ok_or_else(|| QueryError::Decode(format!("bad entry timestamp {ts:?}")))
}
