//! HTTP client wrapper that owns authentication concerns.
//!
//! Attaches the bearer token from the session store to every request and,
//! on HTTP 401, refreshes the token once and retries the original request.
//! When the refresh itself fails the local session is cleared and the
//! expiry observer is notified, so the host can route back to login.

use super::ApiError;
use crate::session::{Session, SessionExpiryObserver, SessionStore};
use chrono::Utc;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

/// Authenticated HTTP client for the Carrie backend.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
    expiry_observer: Arc<dyn SessionExpiryObserver>,
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the backend (e.g., "https://api.askcarrie.example")
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(
        base_url: String,
        timeout_sec: u64,
        session: Arc<dyn SessionStore>,
        expiry_observer: Arc<dyn SessionExpiryObserver>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            client,
            base_url,
            session,
            expiry_observer,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join an absolute path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request with the bearer token attached, retrying once after
    /// a token refresh if the server answers 401.
    ///
    /// The builder closure is invoked once per attempt so request bodies
    /// (including multipart forms) are rebuilt fresh for the retry.
    pub async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self.dispatch(&build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("Request returned 401, refreshing session");
        self.refresh_session().await?;
        self.dispatch(&build).await
    }

    async fn dispatch<F>(&self, build: &F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut request = build(&self.client);
        let session = self
            .session
            .get()
            .map_err(|e| ApiError::Session(e.to_string()))?;
        if let Some(session) = session {
            request = request.bearer_auth(&session.access_token);
        }
        request.send().await.map_err(ApiError::from_reqwest)
    }

    /// Exchange the refresh token for a new token pair. On any failure the
    /// session is cleared and the expiry observer fires.
    async fn refresh_session(&self) -> Result<(), ApiError> {
        let current = self
            .session
            .get()
            .map_err(|e| ApiError::Session(e.to_string()))?;
        let Some(current) = current else {
            self.expire_session();
            return Err(ApiError::Unauthorized);
        };

        let result = self
            .client
            .post(self.url("/v1/auth/refresh"))
            .json(&RefreshRequest {
                refresh_token: &current.refresh_token,
            })
            .send()
            .await;

        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "Token refresh rejected");
                self.expire_session();
                return Err(ApiError::Unauthorized);
            }
            Err(err) => {
                warn!(error = %err, "Token refresh request failed");
                self.expire_session();
                return Err(ApiError::Unauthorized);
            }
        };

        let refreshed: RefreshResponse = match response.json().await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                warn!(error = %err, "Token refresh response was malformed");
                self.expire_session();
                return Err(ApiError::Unauthorized);
            }
        };

        self.session
            .set(Session {
                access_token: refreshed.access_token,
                refresh_token: refreshed.refresh_token,
                user_handle: current.user_handle,
                updated_at: Utc::now(),
            })
            .map_err(|e| ApiError::Session(e.to_string()))?;

        debug!("Session refreshed");
        Ok(())
    }

    fn expire_session(&self) {
        if let Err(err) = self.session.clear() {
            warn!(error = %err, "Failed to clear session");
        }
        self.expiry_observer.session_expired();
    }
}
