//! Stub backend lifecycle management
//!
//! This module manages spawning and shutting down stub Carrie backends.
//! Each test gets an isolated server on a random port that plays back
//! scripted streaming responses and records what the client sent.

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// One scripted streaming response: byte chunks flushed in order with a
/// small delay between them so the client sees multiple reads.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: StatusCode,
    pub chunks: Vec<Vec<u8>>,
}

impl ScriptedResponse {
    /// A 200 response streaming the given chunks.
    pub fn ok(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            chunks,
        }
    }

    /// A non-streaming response with the given status and body.
    pub fn with_status(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            chunks: vec![body.as_bytes().to_vec()],
        }
    }

    /// A 200 response: envelope frame, separator, then one chunk per
    /// payload piece.
    pub fn streamed(envelope: &str, payload_chunks: &[&str]) -> Self {
        let mut chunks = vec![format!("{}\n\n", envelope).into_bytes()];
        chunks.extend(payload_chunks.iter().map(|c| c.as_bytes().to_vec()));
        Self::ok(chunks)
    }
}

/// Shared state of a stub backend instance.
pub struct StubState {
    scripts: Mutex<VecDeque<ScriptedResponse>>,
    /// Multipart fields of every search request received, in arrival
    /// order. File parts are recorded as `name -> "<file_name>:<bytes>"`.
    pub search_requests: Mutex<Vec<Vec<(String, String)>>>,
    pub refresh_calls: Mutex<u32>,
    pub last_refresh_token: Mutex<Option<String>>,
    pub fail_refresh: AtomicBool,
    /// When set, search requests must carry this bearer token; others get
    /// a 401. Refreshing rotates it to "refreshed-access".
    pub valid_token: Mutex<Option<String>>,
}

impl StubState {
    pub fn require_token(&self, token: &str) {
        *self.valid_token.lock().unwrap() = Some(token.to_string());
    }

    pub fn set_fail_refresh(&self) {
        self.fail_refresh.store(true, Ordering::SeqCst);
    }

    pub fn search_request_count(&self) -> usize {
        self.search_requests.lock().unwrap().len()
    }

    pub fn field_names(&self, request_index: usize) -> Vec<String> {
        self.search_requests.lock().unwrap()[request_index]
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn field_value(&self, request_index: usize, name: &str) -> Option<String> {
        self.search_requests.lock().unwrap()[request_index]
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.clone())
    }
}

/// Stub backend instance bound to a random port.
///
/// When dropped, the server gracefully shuts down.
pub struct StubBackend {
    /// Base URL for the client (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    pub state: Arc<StubState>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl StubBackend {
    /// Spawn a stub backend that plays back the given scripts front to
    /// back, one per search request.
    pub async fn spawn(scripts: Vec<ScriptedResponse>) -> Self {
        let state = Arc::new(StubState {
            scripts: Mutex::new(scripts.into()),
            search_requests: Mutex::new(Vec::new()),
            refresh_calls: Mutex::new(0),
            last_refresh_token: Mutex::new(None),
            fail_refresh: AtomicBool::new(false),
            valid_token: Mutex::new(None),
        });

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/v1/search", post(search_handler))
            .route("/v1/auth/refresh", post(refresh_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Stub backend failed");
        });

        let backend = Self {
            base_url,
            state,
            _shutdown_tx: Some(shutdown_tx),
        };
        backend.wait_for_ready().await;
        backend
    }

    /// Waits for the server to become ready by polling the root route.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        loop {
            if start.elapsed() > Duration::from_secs(5) {
                panic!("Stub backend did not become ready");
            }
            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn search_handler(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut fields: Vec<(String, String)> = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name() {
            let file_name = file_name.to_string();
            let bytes = field.bytes().await.unwrap_or_default();
            fields.push((name, format!("{}:{}", file_name, bytes.len())));
        } else {
            let value = field.text().await.unwrap_or_default();
            fields.push((name, value));
        }
    }
    state.search_requests.lock().unwrap().push(fields);

    if let Some(required) = state.valid_token.lock().unwrap().clone() {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", required))
            .unwrap_or(false);
        if !authorized {
            return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
        }
    }

    let script = state.scripts.lock().unwrap().pop_front();
    let Some(script) = script else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no scripted response left").into_response();
    };

    let stream = futures::stream::unfold(script.chunks.into_iter(), |mut chunks| async move {
        let chunk = chunks.next()?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        Some((Ok::<_, std::io::Error>(Bytes::from(chunk)), chunks))
    });
    (script.status, Body::from_stream(stream)).into_response()
}

#[derive(Debug, Deserialize)]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh_handler(
    State(state): State<Arc<StubState>>,
    Json(body): Json<RefreshBody>,
) -> Response {
    *state.last_refresh_token.lock().unwrap() = Some(body.refresh_token);
    *state.refresh_calls.lock().unwrap() += 1;

    if state.fail_refresh.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, "refresh denied").into_response();
    }

    *state.valid_token.lock().unwrap() = Some("refreshed-access".to_string());
    Json(serde_json::json!({
        "access_token": "refreshed-access",
        "refresh_token": "refreshed-refresh",
    }))
    .into_response()
}
