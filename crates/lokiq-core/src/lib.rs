//! lokiq-core: pure domain layer of lokiq.
//!
//! This crate owns everything that does not touch the network: the query and
//! log data model, the expression collaborators, time resolution, target
//! building and the stream merger.
//!
//! # Architecture
//!
//! ```text
//! RawQuery ──► TargetBuilder ──► QueryTarget ──► (lokiq-client: executor)
//!                  │                                     │
//!             TimeResolver                         LogStream[]
//!                                                        │
//!                                         merge_streams ─┴─► LogsModel
//! ```
//!
//! The async executor and live poller live in `lokiq-client`; they feed the
//! merger defined here.

pub mod config;
pub mod error;
pub mod expr;
pub mod labels;
pub mod merge;
pub mod target;
pub mod time;
pub mod types;

pub use error::{DataQueryError, ErrorStatus, QueryError};
pub use labels::Labels;
pub use merge::{make_series, merge_streams, MergeOptions};
pub use target::TargetBuilder;
pub use time::{Clock, DateExpr, SystemClock, TimeRange, TimeResolver};
pub use types::{
    Direction, DisplayMode, ExecutionMode, LogEntry, LogRow, LogStream, LogsModel,
    ParsedSelector, QueryAction, QueryTarget, RawQuery, SeriesLine, SeriesPoint,
};
