//! Mock vendor server for integration tests
//!
//! Serves scripted replies per request path and records every request,
//! so one server can stand in for any of the four vendor APIs.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// A JSON body with a status code
    Json(StatusCode, serde_json::Value),
    /// Server-sent events, one `data:` payload per entry
    Sse(Vec<String>),
    /// Server-sent events that never end after the given payloads
    SseThenStall(Vec<String>),
    /// Newline-delimited JSON, one line per entry
    Ndjson(Vec<serde_json::Value>),
    /// A status with the start of a body that never finishes
    StatusThenStall(StatusCode, String),
}

impl Reply {
    /// A 200 JSON reply
    pub const fn ok(body: serde_json::Value) -> Self {
        Self::Json(StatusCode::OK, body)
    }

    /// SSE reply from JSON payloads
    pub fn sse(events: impl IntoIterator<Item = serde_json::Value>) -> Self {
        Self::Sse(events.into_iter().map(|e| e.to_string()).collect())
    }
}

/// A request as the mock saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
struct MockState {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Scriptable vendor backend
pub struct MockVendor {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockVendor {
    /// Start the mock server, returning immediately
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL with `prefix` appended (e.g. `/v1`)
    pub fn base_url(&self, prefix: &str) -> String {
        format!("http://{}{prefix}", self.addr)
    }

    /// Queue a reply for a path
    ///
    /// Replies are served in order; the last one repeats.
    pub fn reply(&self, path: &str, reply: Reply) -> &Self {
        self.state
            .replies
            .lock()
            .unwrap()
            .entry(path.to_owned())
            .or_default()
            .push_back(reply);
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Number of requests received for a path
    pub fn count(&self, path: &str) -> usize {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }
}

impl Drop for MockVendor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_owned();
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        query: uri.query().map(str::to_owned),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let reply = {
        let mut replies = state.replies.lock().unwrap();
        replies.get_mut(&path).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        })
    };

    match reply {
        Some(reply) => render(reply),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({"error": format!("no reply scripted for {path}")})),
        )
            .into_response(),
    }
}

fn render(reply: Reply) -> Response {
    match reply {
        Reply::Json(status, body) => (status, axum::Json(body)).into_response(),
        Reply::Sse(events) => {
            let body: String = events.iter().map(|data| format!("data: {data}\n\n")).collect();
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Reply::SseThenStall(events) => {
            let chunks = events
                .into_iter()
                .map(|data| Ok::<_, Infallible>(Bytes::from(format!("data: {data}\n\n"))));
            let body = Body::from_stream(stream::iter(chunks).chain(stream::pending()));
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Reply::StatusThenStall(status, partial) => {
            let head = stream::once(async move { Ok::<_, Infallible>(Bytes::from(partial)) });
            let body = Body::from_stream(head.chain(stream::pending()));
            (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        Reply::Ndjson(lines) => {
            let body: String = lines.iter().map(|line| format!("{line}\n")).collect();
            ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
        }
    }
}
