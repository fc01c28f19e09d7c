//! Search domain models and the streaming ingestion engine.

pub mod streaming;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a client-side thread id for a brand new conversation.
pub fn new_thread_id() -> String {
    Uuid::new_v4().to_string()
}

/// A search about to be fired against the backend.
///
/// `search_result_id` present means edit/regenerate of an existing history
/// entry; `None` means a new entry.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub prompt: String,
    pub search_result_id: Option<String>,
    pub thread_id: String,
    pub space_id: Option<String>,
    pub selected_text: Option<String>,
    pub uploaded_files: Vec<UploadedFile>,
    pub model: Option<String>,
    pub use_web_sources: bool,
    pub is_first_search_of_thread: bool,
}

impl SearchRequest {
    /// A minimal request for a new search in the given thread.
    pub fn new(prompt: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            search_result_id: None,
            thread_id: thread_id.into(),
            space_id: None,
            selected_text: None,
            uploaded_files: Vec::new(),
            model: None,
            use_web_sources: true,
            is_first_search_of_thread: false,
        }
    }

    pub fn trimmed_prompt(&self) -> &str {
        self.prompt.trim()
    }
}

/// A file attached to a search request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// What the history entry keeps about an uploaded file once the request
/// has been fired (the bytes themselves are not retained).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFileMeta {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl From<&UploadedFile> for UploadedFileMeta {
    fn from(file: &UploadedFile) -> Self {
        Self {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.bytes.len() as u64,
        }
    }
}

/// The answer payload of a history entry. Exactly one of text, image or
/// document is populated once the stream completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseContent {
    pub text: String,
    pub image_url: Option<String>,
    pub doc_url: Option<String>,
    pub doc_name: Option<String>,
}

/// One prompt/response pair in a thread.
///
/// Created optimistically (`id: None`) the moment a request is fired and
/// mutated in place as stream chunks arrive. `client_ref` correlates the
/// in-flight stream with its entry; the server-assigned `id` is
/// back-filled against it once the envelope has been parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: Option<String>,
    pub client_ref: Uuid,
    pub prompt: String,
    pub content: ResponseContent,
    pub uploaded_files: Vec<UploadedFileMeta>,
    pub selected_text: Option<String>,
    /// Regenerated on every publish so display surfaces re-render even
    /// when field values are unchanged.
    pub render_key: u64,
}

/// Source metadata referenced by 1-based `[n]` markers in answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub site_url: String,
    pub title: String,
    pub domain_short: String,
}

/// Element of the recent-threads index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub title: String,
    pub space_id: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
