//! Domain-specific assertion macros for lokiq harnesses.
//!
//! These add context-rich failure messages that make it clear *which* merge
//! or batch invariant was violated.

/// Assert that a model's rows are ordered by timestamp for a direction.
///
/// ```rust
/// assert_rows_ordered!(model, Direction::Backward);
/// ```
#[macro_export]
macro_rules! assert_rows_ordered {
    ($model:expr, $direction:expr) => {{
        let model: &lokiq_core::LogsModel = &$model;
        let direction: lokiq_core::Direction = $direction;
        for (i, pair) in model.rows.windows(2).enumerate() {
            let ok = match direction {
                lokiq_core::Direction::Backward => pair[0].timestamp_ns >= pair[1].timestamp_ns,
                lokiq_core::Direction::Forward => pair[0].timestamp_ns <= pair[1].timestamp_ns,
            };
            if !ok {
                panic!(
                    "assert_rows_ordered! failed ({:?}) at rows {} and {}:\n  {} then {}",
                    direction,
                    i,
                    i + 1,
                    pair[0].timestamp_ns,
                    pair[1].timestamp_ns
                );
            }
        }
    }};
}

/// Assert that every row carries the expected search filter tag.
#[macro_export]
macro_rules! assert_all_tagged {
    ($model:expr, $tag:expr) => {{
        let model: &lokiq_core::LogsModel = &$model;
        let tag: &str = $tag;
        if let Some(row) = model.rows.iter().find(|r| r.search_filter_tag != tag) {
            panic!(
                "assert_all_tagged! failed:\n  expected: {:?}\n  actual:   {:?}\n  line: {:?}",
                tag, row.search_filter_tag, row.line
            );
        }
    }};
}

/// Unwrap a [`lokiq::QueryData::Logs`] value or panic with what was found.
#[macro_export]
macro_rules! expect_logs {
    ($data:expr) => {{
        match $data {
            lokiq::QueryData::Logs(model) => model,
            other => panic!("expect_logs! failed: got {:?}", other),
        }
    }};
}

/// Unwrap a [`lokiq::QueryData::Series`] value or panic with what was found.
#[macro_export]
macro_rules! expect_series {
    ($data:expr) => {{
        match $data {
            lokiq::QueryData::Series(series) => series,
            other => panic!("expect_series! failed: got {:?}", other),
        }
    }};
}

/// Timestamps of a model's rows, in row order.
pub fn row_timestamps(model: &lokiq_core::LogsModel) -> Vec<i64> {
    model.rows.iter().map(|r| r.timestamp_ns).collect()
}
