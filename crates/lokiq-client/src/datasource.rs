//! Caller-facing datasource API.
//!
//! [`LokiDatasource`] wires configuration, transport, target builder,
//! executor and poller together. Failures cross this boundary as structured
//! [`DataQueryError`] values (`{status: "error", message}`), never as raw
//! transport errors.

use crate::executor::{QueryData, QueryExecutor};
use crate::poller::{self, LiveFeed, LivePoller};
use crate::transport::{HttpTransport, Transport};
use crate::wire;
use lokiq_core::config::Config;
use lokiq_core::expr;
use lokiq_core::{
    merge_streams, DataQueryError, DisplayMode, ExecutionMode, MergeOptions, QueryAction,
    QueryError, RawQuery, TargetBuilder, TimeRange, TimeResolver,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use std::sync::Arc;

/// Label listing endpoint, used as the connectivity probe.
pub const LABELS_PATH: &str = "/api/prom/label";

/// Values endpoint for label `name`, which becomes a single path segment.
pub fn label_values_path(name: &str) -> String {
    format!("{LABELS_PATH}/{}/values", utf8_percent_encode(name, NON_ALPHANUMERIC))
}

/// Successful result of [`LokiDatasource::query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQueryResponse {
    pub data: QueryData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionLevel {
    Success,
    /// Reachable, but something is off (e.g. no labels yet).
    Warning,
    Error,
}

/// Result of [`LokiDatasource::check_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub status: ConnectionLevel,
    pub message: String,
}

pub struct LokiDatasource {
    config: Config,
    executor: Arc<QueryExecutor>,
}

impl LokiDatasource {
    /// HTTP transport and wall-clock time resolution from `config`.
    pub fn new(config: Config) -> Self {
        let transport = Arc::new(HttpTransport::new(
            config.datasource.url.clone(),
            config.datasource.timeout(),
        ));
        let builder = TargetBuilder::new(
            config.datasource.max_lines,
            config.live.window(),
            TimeResolver::system(),
        );
        Self::with_parts(config, transport, builder)
    }

    pub fn with_parts(config: Config, transport: Arc<dyn Transport>, builder: TargetBuilder) -> Self {
        Self {
            config,
            executor: Arc::new(QueryExecutor::new(transport, builder)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn executor(&self) -> &Arc<QueryExecutor> {
        &self.executor
    }

    /// Run `targets` once over `range`.
    ///
    /// Log batches come back as a merged [`QueryData::Logs`] model capped at
    /// `max_lines`; time-series batches as [`QueryData::Series`].
    pub async fn query(
        &self,
        targets: &[RawQuery],
        range: &TimeRange,
        interval_ms: u64,
        display: DisplayMode,
    ) -> Result<DataQueryResponse, DataQueryError> {
        let data = self
            .executor
            .execute(targets, range, interval_ms, display, ExecutionMode::Historical)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "query failed");
                DataQueryError::from(err)
            })?;

        let data = match data {
            QueryData::Streams(streams) => {
                let opts = MergeOptions::new(self.config.datasource.max_lines);
                QueryData::Logs(merge_streams(&streams, &opts))
            }
            other => other,
        };
        Ok(DataQueryResponse { data })
    }

    /// Deliver `targets` as a feed: a live poller in [`ExecutionMode::Live`],
    /// otherwise a single historical frame. Must be called within a tokio
    /// runtime.
    pub fn stream(
        &self,
        targets: Vec<RawQuery>,
        range: TimeRange,
        interval_ms: u64,
        display: DisplayMode,
        mode: ExecutionMode,
    ) -> LiveFeed {
        match mode {
            ExecutionMode::Live => LivePoller::new(
                Arc::clone(&self.executor),
                targets,
                range,
                interval_ms,
                display,
                self.config.live.interval(),
            )
            .subscribe(),
            ExecutionMode::Historical => {
                poller::one_shot(Arc::clone(&self.executor), targets, range, interval_ms, display)
            }
        }
    }

    /// Probe the backend by listing labels. An empty label list is a warning,
    /// not a failure.
    pub async fn check_connection(&self) -> ConnectionStatus {
        match self.label_names().await {
            Ok(labels) if !labels.is_empty() => ConnectionStatus {
                status: ConnectionLevel::Success,
                message: "Data source connected and labels found.".to_string(),
            },
            Ok(_) => ConnectionStatus {
                status: ConnectionLevel::Warning,
                message: QueryError::NoLabelsFound.to_string(),
            },
            Err(err) => ConnectionStatus {
                status: ConnectionLevel::Error,
                message: err.to_string(),
            },
        }
    }

    /// All label names known to the backend.
    pub async fn label_names(&self) -> Result<Vec<String>, QueryError> {
        let response = self.executor.transport().send(LABELS_PATH, &[]).await?;
        wire::decode_label_values(&response.body)
    }

    /// Values seen for label `name`.
    pub async fn label_values(&self, name: &str) -> Result<Vec<String>, QueryError> {
        let path = label_values_path(name);
        let response = self.executor.transport().send(&path, &[]).await?;
        wire::decode_label_values(&response.body)
    }

    /// Apply a label-filter action to a query's expression.
    pub fn modify_query(&self, query: &RawQuery, action: QueryAction) -> RawQuery {
        expr::modify_query(query, &action)
    }
}
