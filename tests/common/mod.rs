//! Shared end-to-end test harness: the stub backend plus recording fakes
//! for the notifier and session-expiry ports.
#![allow(dead_code)] // not every test binary uses every helper

pub mod server;

pub use server::{ScriptedResponse, StubBackend};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use carrie_search_client::config::StreamSettings;
use carrie_search_client::notifications::{Notification, Notifier};
use carrie_search_client::session::{InMemorySessionStore, SessionExpiryObserver};
use carrie_search_client::{ApiClient, SearchEngine, SearchState};

/// Notifier that records everything it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

/// Expiry observer that remembers whether it fired.
#[derive(Default)]
pub struct RecordingExpiryObserver {
    expired: AtomicBool,
}

impl RecordingExpiryObserver {
    pub fn was_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }
}

impl SessionExpiryObserver for RecordingExpiryObserver {
    fn session_expired(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }
}

/// Everything a test needs to drive the engine against a stub backend.
pub struct TestHarness {
    pub engine: Arc<SearchEngine>,
    pub state: Arc<SearchState>,
    pub notifier: Arc<RecordingNotifier>,
    pub observer: Arc<RecordingExpiryObserver>,
    pub session: Arc<InMemorySessionStore>,
}

impl TestHarness {
    pub fn new(backend: &StubBackend) -> Self {
        Self::with_session(backend, InMemorySessionStore::new())
    }

    pub fn with_session(backend: &StubBackend, session: InMemorySessionStore) -> Self {
        let session = Arc::new(session);
        let notifier = Arc::new(RecordingNotifier::default());
        let observer = Arc::new(RecordingExpiryObserver::default());
        let api = Arc::new(ApiClient::new(
            backend.base_url.clone(),
            30,
            session.clone(),
            observer.clone(),
        ));
        let state = Arc::new(SearchState::new());
        let engine = Arc::new(SearchEngine::new(
            api,
            state.clone(),
            notifier.clone(),
            StreamSettings::default(),
        ));
        Self {
            engine,
            state,
            notifier,
            observer,
            session,
        }
    }
}

/// Poll until `predicate` holds or the timeout elapses.
pub async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    predicate()
}
