//! Fake log backend for integration tests.
//!
//! Spins up a minimal `axum` HTTP server on a random TCP port bound to
//! 127.0.0.1. Serves:
//! - `GET /api/prom/query`: canned `{"streams": [...]}` bodies keyed by the
//!   `query` parameter, or a canned error status
//! - `GET /api/prom/label`: the configured label names
//! - `GET /api/prom/tail`: buffered messages as newline-delimited JSON
//!
//! Every query request's parameters are recorded so tests can assert on what
//! the client actually sent.
//!
//! # Example
//!
//! ```rust,ignore
//! let api = FakeLokiApi::start().await.unwrap();
//! api.respond_with(r#"{job="a"}"#, streams_body(&[(r#"{job="a"}"#, &[(100, "hello")])])).await;
//!
//! let ds = http_datasource(&api.base_url(), 1000);
//! ```

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Clone)]
enum Reply {
    Streams(serde_json::Value),
    Error(u16, String),
}

/// State shared between the router and test code.
#[derive(Default)]
struct ApiState {
    /// Replies keyed by the exact `query` parameter.
    replies: HashMap<String, Reply>,
    labels: Vec<String>,
    tail_messages: Vec<serde_json::Value>,
    /// Parameters of every `/api/prom/query` request, in arrival order.
    requests: Vec<HashMap<String, String>>,
}

/// Handle to the running fake backend.
pub struct FakeLokiApi {
    addr: SocketAddr,
    state: Arc<Mutex<ApiState>>,
}

impl FakeLokiApi {
    /// Start the server on a random port. Returns once it is listening.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(ApiState::default()));

        let app = Router::new()
            .route("/api/prom/query", get(query))
            .route("/api/prom/label", get(labels))
            .route("/api/prom/tail", get(tail))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the task a moment to register.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        Ok(Self { addr, state })
    }

    /// Base URL for the API (e.g. `http://127.0.0.1:PORT`).
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Answer requests whose `query` parameter equals `query` with `body`.
    pub async fn respond_with(&self, query: &str, body: serde_json::Value) {
        let mut state = self.state.lock().await;
        state.replies.insert(query.to_string(), Reply::Streams(body));
    }

    /// Fail requests whose `query` parameter equals `query`.
    pub async fn fail(&self, query: &str, status: u16, message: &str) {
        let mut state = self.state.lock().await;
        state
            .replies
            .insert(query.to_string(), Reply::Error(status, message.to_string()));
    }

    pub async fn set_labels(&self, labels: &[&str]) {
        let mut state = self.state.lock().await;
        state.labels = labels.iter().map(|l| l.to_string()).collect();
    }

    /// Buffer a message returned by `/api/prom/tail`.
    pub async fn push_tail(&self, message: serde_json::Value) {
        self.state.lock().await.tail_messages.push(message);
    }

    /// Parameters of every query request received so far.
    pub async fn requests(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().await.requests.clone()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn query(
    State(state): State<Arc<Mutex<ApiState>>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let reply = {
        let mut state = state.lock().await;
        state.requests.push(params.clone());
        params
            .get("query")
            .and_then(|q| state.replies.get(q).cloned())
    };

    match reply {
        Some(Reply::Streams(body)) => Json(body).into_response(),
        Some(Reply::Error(status, message)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            message,
        )
            .into_response(),
        None => Json(serde_json::json!({ "streams": [] })).into_response(),
    }
}

async fn labels(State(state): State<Arc<Mutex<ApiState>>>) -> impl IntoResponse {
    let state = state.lock().await;
    Json(serde_json::json!({ "values": state.labels }))
}

async fn tail(State(state): State<Arc<Mutex<ApiState>>>) -> impl IntoResponse {
    let state = state.lock().await;
    let body: Vec<String> = state
        .tail_messages
        .iter()
        .map(|m| m.to_string())
        .collect();
    (StatusCode::OK, body.join("\n"))
}
