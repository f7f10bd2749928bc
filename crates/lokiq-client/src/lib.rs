//! lokiq-client: backend I/O for lokiq.
//!
//! Each module talks to the log backend through the [`Transport`] seam:
//! the executor fans a batch out concurrently, the poller re-runs it on a
//! timer, and the datasource exposes both to callers.

pub mod datasource;
pub mod executor;
pub mod poller;
pub mod transport;
pub mod wire;

pub use datasource::{ConnectionLevel, ConnectionStatus, DataQueryResponse, LokiDatasource};
pub use executor::{BatchOutcome, QueryData, QueryExecutor, TargetOutcome, QUERY_PATH};
pub use poller::{Frame, LiveFeed, LivePoller, PollerState, SlotResult};
pub use transport::{HttpTransport, Response, Transport, TransportError};
