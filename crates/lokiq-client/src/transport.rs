//! Transport: the request/response seam between lokiq and the backend.
//!
//! The executor only needs [`Transport::send`]; [`Transport::open_stream`] is
//! the streaming variant for push-style tail endpoints. [`HttpTransport`]
//! implements both over hyper. Tests substitute their own implementation.
//!
//! No datasource operation calls `open_stream` yet: live mode polls through
//! `send`. It is kept so a tail-based feed can sit behind the same trait.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::header::{ACCEPT, HeaderValue};
use hyper::{Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use lokiq_core::QueryError;
use std::time::Duration;

/// A successful backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid request url {0:?}")]
    InvalidUrl(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connection(String),
}

impl From<TransportError> for QueryError {
    fn from(err: TransportError) -> Self {
        let status = match &err {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        };
        let message = match err {
            TransportError::Status { message, .. } => message,
            other => other.to_string(),
        };
        QueryError::BackendRequestFailed {
            ref_id: None,
            status,
            message,
        }
    }
}

/// Issues backend requests. `params` are sent as the URL query string.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        path: &'a str,
        params: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Response, TransportError>>;

    /// Streaming variant: one item per pushed message. Defaults to a single
    /// [`send`](Transport::send).
    fn open_stream<'a>(
        &'a self,
        path: &'a str,
        params: &'a [(String, String)],
    ) -> BoxStream<'a, Result<Response, TransportError>> {
        stream::once(self.send(path, params)).boxed()
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// hyper-backed transport. Idle connections are not pooled, so every request
/// (and every live tick) opens a fresh connection.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    timeout: Duration,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build_http();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn uri(&self, path: &str, params: &[(String, String)]) -> Result<Uri, TransportError> {
        let mut url = format!("{}{}", self.base_url, path);
        if !params.is_empty() {
            let query = serde_urlencoded::to_string(params)
                .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            url.push('?');
            url.push_str(&query);
        }
        url.parse().map_err(|_| TransportError::InvalidUrl(url))
    }

    /// Send the request and check the status; the body is left unread.
    async fn connect(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<(u16, Incoming), TransportError> {
        let uri = self.uri(path, params)?;
        tracing::debug!(%uri, "GET");
        let request = Request::get(uri)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .body(Empty::new())
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok((status.as_u16(), response.into_body()));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map(|b| b.to_bytes())
            .unwrap_or_default();
        let text = String::from_utf8_lossy(&body).trim().to_string();
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            text
        };
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        path: &'a str,
        params: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            let (status, body) = self.connect(path, params).await?;
            let body = tokio::time::timeout(self.timeout, body.collect())
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))?
                .map_err(|e| TransportError::Connection(e.to_string()))?
                .to_bytes();
            Ok(Response { status, body })
        })
    }

    /// Yields one [`Response`] per newline-delimited document in the body,
    /// as soon as each line is complete. Blank lines are skipped.
    ///
    /// Not used by the live poller, which polls through `send`.
    fn open_stream<'a>(
        &'a self,
        path: &'a str,
        params: &'a [(String, String)],
    ) -> BoxStream<'a, Result<Response, TransportError>> {
        enum Tail<'a> {
            Connect(BoxFuture<'a, Result<(u16, Incoming), TransportError>>),
            Read(LineReader),
            Done,
        }

        let start = Tail::Connect(Box::pin(self.connect(path, params)));
        stream::unfold(start, |state| async move {
            let mut reader = match state {
                Tail::Connect(connecting) => match connecting.await {
                    Ok((status, body)) => LineReader::new(status, body),
                    Err(err) => return Some((Err(err), Tail::Done)),
                },
                Tail::Read(reader) => reader,
                Tail::Done => return None,
            };
            match reader.next_line().await {
                Some(Ok(body)) => {
                    let status = reader.status;
                    Some((Ok(Response { status, body }), Tail::Read(reader)))
                }
                Some(Err(err)) => Some((Err(err), Tail::Done)),
                None => None,
            }
        })
        .boxed()
    }
}

/// Splits a streaming body into lines.
struct LineReader {
    status: u16,
    body: Incoming,
    buf: Vec<u8>,
    eof: bool,
}

impl LineReader {
    fn new(status: u16, body: Incoming) -> Self {
        Self {
            status,
            body,
            buf: Vec::new(),
            eof: false,
        }
    }

    async fn next_line(&mut self) -> Option<Result<Bytes, TransportError>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = line.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                return Some(Ok(Bytes::copy_from_slice(line)));
            }
            if self.eof {
                let rest = std::mem::take(&mut self.buf);
                let rest = rest.trim_ascii();
                return (!rest.is_empty()).then(|| Ok(Bytes::copy_from_slice(rest)));
            }
            match self.body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        self.buf.extend_from_slice(&data);
                    }
                }
                Some(Err(err)) => {
                    self.eof = true;
                    self.buf.clear();
                    return Some(Err(TransportError::Connection(err.to_string())));
                }
                None => self.eof = true,
            }
        }
    }
}
