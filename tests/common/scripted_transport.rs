//! ScriptedTransport: an in-process [`Transport`] with scripted replies.
//!
//! Useful for live-poller tests that run under `tokio::time::pause()`, where
//! a real socket would race the auto-advancing clock. Each call can be
//! delayed, and individual calls can be scripted to fail.

use futures::future::BoxFuture;
use lokiq::Transport;
use lokiq_client::{Response, TransportError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A recorded call: its 1-based number, the path and the parameters sent.
#[derive(Debug, Clone)]
pub struct Call {
    pub number: usize,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn param_i64(&self, key: &str) -> i64 {
        self.param(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| panic!("call {} has no numeric {key:?}", self.number))
    }
}

pub struct ScriptedTransport {
    body: String,
    delay: Duration,
    failing_calls: HashSet<usize>,
    calls: AtomicUsize,
    log: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    /// Every call succeeds immediately with `body`.
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body: body.to_string(),
            delay: Duration::ZERO,
            failing_calls: HashSet::new(),
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with `body` sent verbatim, JSON or not.
    pub fn raw(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Self::new(serde_json::Value::Null)
        }
    }

    /// Every call waits `delay` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Calls with these 1-based numbers answer HTTP 500.
    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.failing_calls.extend(calls);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        path: &'a str,
        params: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            let number = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.log.lock().unwrap().push(Call {
                number,
                path: path.to_string(),
                params: params.to_vec(),
            });
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing_calls.contains(&number) {
                return Err(TransportError::Status {
                    status: 500,
                    message: format!("scripted failure on call {number}"),
                });
            }
            Ok(Response {
                status: 200,
                body: self.body.clone().into(),
            })
        })
    }
}
