//! Stream ingestion engine.
//!
//! Owns one search round-trip: optimistic state insert, multipart request
//! construction, incremental decode of the streamed response body, mode
//! finalization and the recent-threads promotion. Every failure is
//! recovered in one place and surfaced as a single notification; the
//! progress flags are always reset when a run ends, however it ends.

use std::sync::Arc;

use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::frame::{FrameDecoder, StreamEnvelope, StreamMode};
use crate::api::{ApiClient, ApiError};
use crate::config::StreamSettings;
use crate::notifications::{Notification, Notifier};
use crate::search::{ResponseContent, SearchRequest};
use crate::state::SearchState;

const SEARCH_PATH: &str = "/v1/search";

#[derive(Debug, Deserialize)]
struct ImagePayload {
    error: Option<String>,
    img_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilePayload {
    error: Option<String>,
    doc_url: Option<String>,
    doc_name: Option<String>,
}

/// Handle to a search spawned on the runtime.
pub struct SearchHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SearchHandle {
    /// Abandon the in-flight stream. No further state is published for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the search task to finish (including after a cancel).
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/// The stream ingestion engine.
pub struct SearchEngine {
    api: Arc<ApiClient>,
    state: Arc<SearchState>,
    notifier: Arc<dyn Notifier>,
    settings: StreamSettings,
}

impl SearchEngine {
    pub fn new(
        api: Arc<ApiClient>,
        state: Arc<SearchState>,
        notifier: Arc<dyn Notifier>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            api,
            state,
            notifier,
            settings,
        }
    }

    pub fn state(&self) -> &Arc<SearchState> {
        &self.state
    }

    /// Spawn `fire_search` on the runtime, returning a handle that can
    /// abandon the stream.
    pub fn spawn_search(self: &Arc<Self>, request: SearchRequest) -> SearchHandle {
        let cancel = CancellationToken::new();
        let engine = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            engine.fire_search(request, token).await;
        });
        SearchHandle { cancel, task }
    }

    /// Run one search against the backend, streaming the answer into
    /// shared state. Recovers from every failure internally; the caller
    /// gets nothing back.
    pub async fn fire_search(&self, request: SearchRequest, cancel: CancellationToken) {
        if request.trimmed_prompt().is_empty() {
            debug!("Ignoring search with empty prompt");
            return;
        }

        self.state.update_flags(|flags| flags.search_in_progress = true);
        let client_ref = self.state.upsert_optimistic(&request);

        match self.run_stream(&request, client_ref, &cancel).await {
            Ok(()) => {
                self.state.promote_thread(
                    &request.thread_id,
                    request.trimmed_prompt(),
                    request.space_id.as_deref(),
                );
            }
            Err(ApiError::Cancelled) => {
                debug!(thread_id = %request.thread_id, "Search cancelled");
            }
            Err(err) => {
                warn!(
                    thread_id = %request.thread_id,
                    retryable = err.is_retryable(),
                    error = %err,
                    "Search failed"
                );
                self.notifier
                    .notify(Notification::error("Something went wrong", err.user_message()));
            }
        }

        self.state.reset_progress_flags();
    }

    async fn run_stream(
        &self,
        request: &SearchRequest,
        client_ref: Uuid,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let url = self.api.url(SEARCH_PATH);
        let response = self
            .api
            .send(|client| client.post(&url).multipart(build_form(request)))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, body));
        }

        self.state.update_flags(|flags| flags.stream_in_progress = true);

        let mut stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let mut envelope: Option<StreamEnvelope> = None;
        let mut published_buckets = 0usize;
        let threshold = self.settings.publish_threshold_chars.max(1);

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else {
                break;
            };
            let bytes = chunk.map_err(ApiError::from_reqwest)?;
            decoder.feed(&bytes);

            if envelope.is_none() {
                let Some(raw) = decoder.envelope_json() else {
                    continue;
                };
                let parsed: StreamEnvelope = serde_json::from_str(raw)
                    .map_err(|e| ApiError::Parse(format!("Malformed stream envelope: {}", e)))?;
                match parsed.mode() {
                    StreamMode::ImageGeneration => self
                        .state
                        .update_flags(|flags| flags.image_generation_in_progress = true),
                    StreamMode::FileGeneration => self
                        .state
                        .update_flags(|flags| flags.file_generation_in_progress = true),
                    _ => {}
                }
                envelope = Some(parsed);
            }

            // The buffer itself is the full text so far; publish whenever
            // its length crosses another threshold multiple.
            if matches!(envelope.as_ref().map(StreamEnvelope::mode), Some(StreamMode::PlainText)) {
                let bucket = decoder.payload_char_count() / threshold;
                while published_buckets < bucket {
                    published_buckets += 1;
                    self.state.publish_text(client_ref, decoder.payload());
                }
            }
        }

        let envelope = envelope
            .ok_or_else(|| ApiError::Parse("Stream ended before the envelope frame".to_string()))?;
        let content = finalize_content(envelope.mode(), decoder.payload())?;
        self.state
            .finalize(client_ref, content, envelope.search_result_id);
        Ok(())
    }
}

/// Build the multipart body: file blobs under the repeated `files` field,
/// then the scalar fields. Absent optionals are omitted entirely, never
/// sent as empty strings.
fn build_form(request: &SearchRequest) -> Form {
    let mut form = Form::new();

    for file in &request.uploaded_files {
        let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        let part = match part.mime_str(&file.mime_type) {
            Ok(part) => part,
            Err(_) => Part::bytes(file.bytes.clone()).file_name(file.name.clone()),
        };
        form = form.part("files", part);
    }

    form = form
        .text("prompt", request.trimmed_prompt().to_string())
        .text("thread_id", request.thread_id.clone())
        .text(
            "is_first_search_of_thread",
            request.is_first_search_of_thread.to_string(),
        )
        .text("use_web_sources", request.use_web_sources.to_string());

    if let Some(id) = &request.search_result_id {
        form = form.text("search_result_id", id.clone());
    }
    if let Some(space_id) = &request.space_id {
        form = form.text("space_id", space_id.clone());
    }
    if let Some(selected_text) = &request.selected_text {
        form = form.text("selected_text", selected_text.clone());
    }
    if let Some(model) = &request.model {
        form = form.text("model", model.clone());
    }

    form
}

/// Interpret the completed payload buffer according to the stream mode.
fn finalize_content(mode: StreamMode, payload: &str) -> Result<ResponseContent, ApiError> {
    match mode {
        StreamMode::PlainText => Ok(ResponseContent {
            text: payload.to_string(),
            ..Default::default()
        }),
        StreamMode::Error => Ok(ResponseContent {
            text: in_band_error_text(payload),
            ..Default::default()
        }),
        StreamMode::ImageGeneration => {
            let parsed: ImagePayload = serde_json::from_str(payload)
                .map_err(|e| ApiError::Parse(format!("Malformed image payload: {}", e)))?;
            if let Some(message) = parsed.error {
                return Ok(ResponseContent {
                    text: message,
                    ..Default::default()
                });
            }
            let img_url = parsed
                .img_url
                .ok_or_else(|| ApiError::Parse("Image payload missing img_url".to_string()))?;
            Ok(ResponseContent {
                image_url: Some(img_url),
                ..Default::default()
            })
        }
        StreamMode::FileGeneration => {
            let parsed: FilePayload = serde_json::from_str(payload)
                .map_err(|e| ApiError::Parse(format!("Malformed document payload: {}", e)))?;
            if let Some(message) = parsed.error {
                return Ok(ResponseContent {
                    text: message,
                    ..Default::default()
                });
            }
            let doc_url = parsed
                .doc_url
                .ok_or_else(|| ApiError::Parse("Document payload missing doc_url".to_string()))?;
            Ok(ResponseContent {
                doc_url: Some(doc_url),
                doc_name: parsed.doc_name,
                ..Default::default()
            })
        }
    }
}

/// Server-reported errors are shown inline as if they were the answer.
/// The payload is usually `{"message": ...}` or `{"error": ...}`; anything
/// else is displayed verbatim.
fn in_band_error_text(payload: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(|field| field.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| payload.to_string())
}
