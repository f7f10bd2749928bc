//! lokiq: query and live-tail client for Loki-style log backends.
//!
//! This crate re-exports the two workspace layers so that integration tests
//! and the CLI can import them from one place.
//!
//! # Architecture
//!
//! ```text
//! RawQuery[] ──► TargetBuilder ──► QueryExecutor ──► Transport ──► backend
//!                                      │    ▲
//!                         merge_streams│    │ every tick
//!                                      ▼    │
//!                                  LogsModel LivePoller ──► LiveFeed
//! ```

pub use lokiq_client::{
    BatchOutcome, ConnectionLevel, ConnectionStatus, DataQueryResponse, Frame, LiveFeed,
    LivePoller, LokiDatasource, PollerState, QueryData, QueryExecutor, TargetOutcome, Transport,
};
pub use lokiq_core::{
    DataQueryError, DateExpr, Direction, DisplayMode, ExecutionMode, Labels, LogEntry, LogRow,
    LogStream, LogsModel, QueryAction, QueryError, RawQuery, SeriesLine, SeriesPoint,
    TargetBuilder, TimeRange, TimeResolver,
};
