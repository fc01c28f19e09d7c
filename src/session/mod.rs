//! Authenticated-session state.
//!
//! All session access goes through the `SessionStore` trait: login
//! populates it, logout or refresh failure clears it, and the API client
//! reads it per request. Feature code never touches the underlying
//! storage directly.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// The tokens identifying an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_handle: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            user_handle: None,
            updated_at: Utc::now(),
        }
    }
}

/// Process-wide session state with an explicit lifecycle.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Result<Option<Session>>;
    fn set(&self, session: Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Invoked when the session can no longer be refreshed. The host
/// application navigates back to its login surface from here.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait SessionExpiryObserver: Send + Sync {
    fn session_expired(&self);
}

/// Observer that does nothing; for embedders that poll the store instead.
pub struct NoopExpiryObserver;

impl SessionExpiryObserver for NoopExpiryObserver {
    fn session_expired(&self) {}
}

/// Session store held only in process memory.
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Option<Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self) -> Result<Option<Session>> {
        Ok(self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("Session lock poisoned"))?
            .clone())
    }

    fn set(&self, session: Session) -> Result<()> {
        *self
            .inner
            .write()
            .map_err(|_| anyhow::anyhow!("Session lock poisoned"))? = Some(session);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .inner
            .write()
            .map_err(|_| anyhow::anyhow!("Session lock poisoned"))? = None;
        Ok(())
    }
}

/// File-backed session store used by the CLI so a login survives process
/// restarts. The file holds the session as pretty-printed JSON.
pub struct FileSessionStore {
    path: PathBuf,
    cache: RwLock<Option<Session>>,
}

impl FileSessionStore {
    /// Open the store, loading an existing session file if one is present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cached = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read session file: {:?}", path))?;
            Some(
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse session file: {:?}", path))?,
            )
        } else {
            None
        };

        Ok(Self {
            path,
            cache: RwLock::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Result<Option<Session>> {
        Ok(self
            .cache
            .read()
            .map_err(|_| anyhow::anyhow!("Session lock poisoned"))?
            .clone())
    }

    fn set(&self, session: Session) -> Result<()> {
        let json = serde_json::to_string_pretty(&session)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create session dir: {:?}", parent))?;
            }
        }
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session file: {:?}", self.path))?;
        *self
            .cache
            .write()
            .map_err(|_| anyhow::anyhow!("Session lock poisoned"))? = Some(session);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file: {:?}", self.path))?;
        }
        *self
            .cache
            .write()
            .map_err(|_| anyhow::anyhow!("Session lock poisoned"))? = None;
        Ok(())
    }
}
