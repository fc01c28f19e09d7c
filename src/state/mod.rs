//! Shared search state.
//!
//! One container owns the search history, the progress flags and the
//! recent-threads index. The stream ingestion engine is the only writer
//! pathway; display surfaces read snapshots and observe the revision
//! watch channel to know when to re-read.

use crate::search::{ResponseContent, SearchHistoryEntry, SearchRequest, ThreadSummary};
use chrono::Utc;
use std::sync::RwLock;
use tokio::sync::watch;
use uuid::Uuid;

/// The four booleans the UI keys its loading affordances on. Always reset
/// together when a search run ends, however it ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressFlags {
    pub search_in_progress: bool,
    pub stream_in_progress: bool,
    pub image_generation_in_progress: bool,
    pub file_generation_in_progress: bool,
}

impl ProgressFlags {
    pub fn any(&self) -> bool {
        self.search_in_progress
            || self.stream_in_progress
            || self.image_generation_in_progress
            || self.file_generation_in_progress
    }
}

#[derive(Debug, Default)]
struct StateInner {
    entries: Vec<SearchHistoryEntry>,
    threads: Vec<ThreadSummary>,
    flags: ProgressFlags,
    render_key_seq: u64,
    revision: u64,
    text_publishes: u64,
}

impl StateInner {
    fn next_render_key(&mut self) -> u64 {
        self.render_key_seq += 1;
        self.render_key_seq
    }
}

/// The shared state container.
pub struct SearchState {
    inner: RwLock<StateInner>,
    revision_tx: watch::Sender<u64>,
}

impl SearchState {
    pub fn new() -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            inner: RwLock::new(StateInner::default()),
            revision_tx,
        }
    }

    /// Observe state revisions; the payload is the revision counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    pub fn entries(&self) -> Vec<SearchHistoryEntry> {
        self.read().entries.clone()
    }

    pub fn threads(&self) -> Vec<ThreadSummary> {
        self.read().threads.clone()
    }

    pub fn flags(&self) -> ProgressFlags {
        self.read().flags
    }

    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Number of incremental text snapshots published so far; finalization
    /// publishes are not counted.
    pub fn text_publish_count(&self) -> u64 {
        self.read().text_publishes
    }

    /// Insert the optimistic entry for a new search, or rework the entry
    /// matching `search_result_id` for an edit/regenerate. Returns the
    /// correlation ref all subsequent publishes of this run use.
    pub fn upsert_optimistic(&self, request: &SearchRequest) -> Uuid {
        let mut guard = self.write();
        let inner = &mut *guard;
        let render_key = inner.next_render_key();
        let uploaded_files = request.uploaded_files.iter().map(Into::into).collect();

        if let Some(target_id) = &request.search_result_id {
            if let Some(entry) = inner
                .entries
                .iter_mut()
                .find(|e| e.id.as_deref() == Some(target_id.as_str()))
            {
                entry.prompt = request.trimmed_prompt().to_string();
                entry.content = ResponseContent::default();
                entry.uploaded_files = uploaded_files;
                entry.selected_text = request.selected_text.clone();
                entry.render_key = render_key;
                let client_ref = entry.client_ref;
                self.bump(inner);
                return client_ref;
            }
        }

        let client_ref = Uuid::new_v4();
        let entry = SearchHistoryEntry {
            id: request.search_result_id.clone(),
            client_ref,
            prompt: request.trimmed_prompt().to_string(),
            content: ResponseContent::default(),
            uploaded_files,
            selected_text: request.selected_text.clone(),
            render_key,
        };
        inner.entries.push(entry);
        self.bump(inner);
        client_ref
    }

    /// Publish a snapshot of the growing answer text.
    pub fn publish_text(&self, client_ref: Uuid, text: &str) {
        let mut guard = self.write();
        let inner = &mut *guard;
        let render_key = inner.next_render_key();
        if let Some(entry) = inner
            .entries
            .iter_mut()
            .find(|e| e.client_ref == client_ref)
        {
            entry.content.text = text.to_string();
            entry.render_key = render_key;
            inner.text_publishes += 1;
            self.bump(inner);
        }
    }

    /// Final publish for a completed stream. Back-fills the server id,
    /// matched on the correlation ref (never on list position), and only
    /// when the entry has no id yet.
    pub fn finalize(&self, client_ref: Uuid, content: ResponseContent, server_id: Option<String>) {
        let mut guard = self.write();
        let inner = &mut *guard;
        let render_key = inner.next_render_key();
        if let Some(entry) = inner
            .entries
            .iter_mut()
            .find(|e| e.client_ref == client_ref)
        {
            entry.content = content;
            if entry.id.is_none() {
                entry.id = server_id;
            }
            entry.render_key = render_key;
            self.bump(inner);
        }
    }

    pub fn update_flags(&self, apply: impl FnOnce(&mut ProgressFlags)) {
        let mut guard = self.write();
        let inner = &mut *guard;
        apply(&mut inner.flags);
        self.bump(inner);
    }

    pub fn reset_progress_flags(&self) {
        self.update_flags(|flags| *flags = ProgressFlags::default());
    }

    /// Move the thread to the front of the recent-threads index, inserting
    /// it if absent. One entry per thread id.
    pub fn promote_thread(&self, thread_id: &str, title: &str, space_id: Option<&str>) {
        let mut guard = self.write();
        let inner = &mut *guard;
        if let Some(pos) = inner.threads.iter().position(|t| t.thread_id == thread_id) {
            let mut summary = inner.threads.remove(pos);
            summary.updated_at = Utc::now();
            inner.threads.insert(0, summary);
        } else {
            inner.threads.insert(
                0,
                ThreadSummary {
                    thread_id: thread_id.to_string(),
                    title: title.to_string(),
                    space_id: space_id.map(str::to_string),
                    updated_at: Utc::now(),
                },
            );
        }
        self.bump(inner);
    }

    fn bump(&self, inner: &mut StateInner) {
        inner.revision += 1;
        let _ = self.revision_tx.send(inner.revision);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StateInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StateInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new()
    }
}
