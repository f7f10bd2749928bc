//! Error taxonomy shared by every lokiq layer.

use serde::Serialize;

/// Failures surfaced by target building, execution and decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The date-math evaluator could not parse a time expression.
    #[error("invalid time expression {expr:?}: {reason}")]
    InvalidTimeExpression { expr: String, reason: String },

    /// The resolved window is empty or inverted.
    #[error("invalid time range: start {start_ns} is not before end {end_ns}")]
    InvalidTimeRange { start_ns: i64, end_ns: i64 },

    /// A backend call for one target failed.
    #[error("{}", backend_message(.ref_id, .status, .message))]
    BackendRequestFailed {
        ref_id: Option<String>,
        status: Option<u16>,
        message: String,
    },

    /// The backend answered but knows no labels.
    #[error("data source connected, but no labels received; verify that the backend is receiving logs")]
    NoLabelsFound,

    /// A backend response could not be decoded.
    #[error("cannot decode backend response: {0}")]
    Decode(String),
}

fn backend_message(ref_id: &Option<String>, status: &Option<u16>, message: &str) -> String {
    let mut out = String::from("backend request failed");
    if let Some(ref_id) = ref_id {
        out.push_str(&format!(" for target {ref_id}"));
    }
    if let Some(status) = status {
        out.push_str(&format!(" (HTTP {status})"));
    }
    out.push_str(": ");
    out.push_str(message);
    out
}

impl QueryError {
    /// Attach a target identity to a backend failure that lacks one.
    pub fn with_ref_id(self, id: &str) -> Self {
        match self {
            QueryError::BackendRequestFailed {
                ref_id: None,
                status,
                message,
            } => QueryError::BackendRequestFailed {
                ref_id: Some(id.to_string()),
                status,
                message,
            },
            other => other,
        }
    }

    pub fn ref_id(&self) -> Option<&str> {
        match self {
            QueryError::BackendRequestFailed { ref_id, .. } => ref_id.as_deref(),
            _ => None,
        }
    }
}

/// Status tag of a structured caller-facing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStatus {
    Error,
}

/// The structured `{status: "error", message}` form handed to callers in
/// place of a raw error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQueryError {
    pub status: ErrorStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

impl From<QueryError> for DataQueryError {
    fn from(err: QueryError) -> Self {
        Self {
            status: ErrorStatus::Error,
            ref_id: err.ref_id().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for DataQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
