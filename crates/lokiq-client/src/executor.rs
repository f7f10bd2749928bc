//! Query executor: runs one backend request per target, concurrently.
//!
//! Every surviving target of a batch is built and requested at once; the
//! batch settles only when all of them have answered (join semantics). The
//! outcome can be read positionally, as a structured complete/partial/failed
//! result, or all-or-nothing.

use crate::transport::Transport;
use crate::wire;
use futures::future::join_all;
use lokiq_core::{
    merge_streams, DisplayMode, ExecutionMode, LogStream, LogsModel, MergeOptions, QueryError,
    RawQuery, SeriesLine, TargetBuilder, TimeRange,
};
use serde::Serialize;
use std::sync::Arc;

/// Log query endpoint.
pub const QUERY_PATH: &str = "/api/prom/query";

/// Result data of a batch, shaped by its display mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum QueryData {
    /// Tagged streams, unmerged.
    Streams(Vec<LogStream>),
    /// Merged rows.
    Logs(LogsModel),
    Series(Vec<SeriesLine>),
}

impl QueryData {
    /// The empty value for `display`.
    pub fn empty(display: DisplayMode) -> Self {
        match display {
            DisplayMode::Logs => QueryData::Streams(Vec::new()),
            DisplayMode::TimeSeries => QueryData::Series(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            QueryData::Streams(s) => s.is_empty(),
            QueryData::Logs(m) => m.is_empty(),
            QueryData::Series(s) => s.is_empty(),
        }
    }
}

/// Outcome of one target within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Suppressed or empty; never sent.
    Skipped,
    Streams(Vec<LogStream>),
    Failed(QueryError),
}

/// Structured result of a whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Complete(Vec<LogStream>),
    /// Some targets answered; `streams` holds only their data.
    Partial {
        streams: Vec<LogStream>,
        failures: Vec<QueryError>,
    },
    Failed(Vec<QueryError>),
}

impl BatchOutcome {
    fn from_outcomes(outcomes: Vec<TargetOutcome>) -> Self {
        let mut streams = Vec::new();
        let mut failures = Vec::new();
        let mut answered = 0usize;
        for outcome in outcomes {
            match outcome {
                TargetOutcome::Skipped => {}
                TargetOutcome::Streams(s) => {
                    answered += 1;
                    streams.extend(s);
                }
                TargetOutcome::Failed(e) => failures.push(e),
            }
        }
        match (failures.is_empty(), answered) {
            (true, _) => BatchOutcome::Complete(streams),
            (false, 0) => BatchOutcome::Failed(failures),
            (false, _) => BatchOutcome::Partial { streams, failures },
        }
    }

    /// All-or-nothing view: the first failure, in target order, wins.
    pub fn into_result(self) -> Result<Vec<LogStream>, QueryError> {
        match self {
            BatchOutcome::Complete(streams) => Ok(streams),
            BatchOutcome::Partial { mut failures, .. } | BatchOutcome::Failed(mut failures) => {
                Err(failures.swap_remove(0))
            }
        }
    }
}

/// Runs batches of [`RawQuery`]s against a [`Transport`].
#[derive(Clone)]
pub struct QueryExecutor {
    transport: Arc<dyn Transport>,
    builder: TargetBuilder,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn Transport>, builder: TargetBuilder) -> Self {
        Self { transport, builder }
    }

    pub fn builder(&self) -> &TargetBuilder {
        &self.builder
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// One outcome per input target, in input order. No request is issued
    /// when every target is skipped.
    pub async fn execute_positional(
        &self,
        targets: &[RawQuery],
        range: &TimeRange,
        mode: ExecutionMode,
    ) -> Vec<TargetOutcome> {
        let active = targets.iter().filter(|q| !q.is_skipped()).count();
        if active == 0 {
            tracing::debug!(targets = targets.len(), "every target skipped; no backend call");
            return vec![TargetOutcome::Skipped; targets.len()];
        }

        tracing::debug!(targets = targets.len(), active, ?mode, "executing batch");
        let requests = targets.iter().map(|query| async move {
            if query.is_skipped() {
                return TargetOutcome::Skipped;
            }
            match self.run_target(query, range, mode).await {
                Ok(streams) => TargetOutcome::Streams(streams),
                Err(err) => {
                    tracing::debug!(ref_id = %query.ref_id, error = %err, "target failed");
                    TargetOutcome::Failed(err)
                }
            }
        });
        join_all(requests).await
    }

    /// Structured complete/partial/failed result of a batch.
    pub async fn execute_settled(
        &self,
        targets: &[RawQuery],
        range: &TimeRange,
        mode: ExecutionMode,
    ) -> BatchOutcome {
        BatchOutcome::from_outcomes(self.execute_positional(targets, range, mode).await)
    }

    /// All-or-nothing execution shaped by `display`: time-series batches are
    /// merged into series bucketed by `interval_ms`, log batches return the
    /// tagged streams.
    pub async fn execute(
        &self,
        targets: &[RawQuery],
        range: &TimeRange,
        interval_ms: u64,
        display: DisplayMode,
        mode: ExecutionMode,
    ) -> Result<QueryData, QueryError> {
        let streams = self
            .execute_settled(targets, range, mode)
            .await
            .into_result()?;
        Ok(self.shape(streams, interval_ms, display))
    }

    /// Present `streams` in `display` mode.
    pub fn shape(&self, streams: Vec<LogStream>, interval_ms: u64, display: DisplayMode) -> QueryData {
        match display {
            DisplayMode::Logs => QueryData::Streams(streams),
            DisplayMode::TimeSeries => {
                let opts = MergeOptions::new(self.builder.max_lines()).series(interval_ms);
                QueryData::Series(merge_streams(&streams, &opts).series)
            }
        }
    }

    async fn run_target(
        &self,
        query: &RawQuery,
        range: &TimeRange,
        mode: ExecutionMode,
    ) -> Result<Vec<LogStream>, QueryError> {
        let target = self.builder.build(query, range, mode)?;
        let params = target.to_params();
        tracing::debug!(
            ref_id = %target.ref_id,
            query = %target.expression(),
            start = target.start_ns,
            end = target.end_ns,
            limit = target.limit,
            "querying backend"
        );
        let response = self
            .transport
            .send(QUERY_PATH, &params)
            .await
            .map_err(|e| QueryError::from(e).with_ref_id(&target.ref_id))?;
        wire::decode_streams(&response.body, &target.regexp).map_err(|err| {
            QueryError::BackendRequestFailed {
                ref_id: Some(target.ref_id.clone()),
                status: Some(response.status),
                message: err.to_string(),
            }
        })
    }
}
