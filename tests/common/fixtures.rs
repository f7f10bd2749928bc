//! Canned backend payloads used across harnesses.

use serde_json::{json, Value};

/// A `/api/prom/query` body. Each stream is `(label string, [(ts_ns, line)])`;
/// timestamps are sent as nanosecond integers.
pub fn streams_body(streams: &[(&str, &[(i64, &str)])]) -> Value {
    let streams: Vec<Value> = streams
        .iter()
        .map(|(labels, entries)| {
            let entries: Vec<Value> = entries
                .iter()
                .map(|(ts, line)| json!({ "ts": ts.to_string(), "line": line }))
                .collect();
            json!({ "labels": labels, "entries": entries })
        })
        .collect();
    json!({ "streams": streams })
}

/// A body with RFC 3339 entry timestamps, as older backends send them.
pub fn rfc3339_body() -> Value {
    json!({
        "streams": [{
            "labels": "{job=\"api\", env=\"prod\"}",
            "entries": [
                { "ts": "2024-01-15T09:59:59.000000003Z", "line": "GET /api/v1/users 200 OK (12ms)" },
                { "ts": "2024-01-15T09:59:58.5Z", "line": "upstream timeout after 30s" }
            ]
        }]
    })
}

/// An empty query body.
pub fn no_streams() -> Value {
    json!({ "streams": [] })
}
