//! Error taxonomy for the API transport.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors crossing the API client boundary.
///
/// A closed set so callers can branch user messaging and retry
/// eligibility on the failure kind instead of collapsing everything into
/// one generic case.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request rejected (status {status}): {message}")]
    Client { status: u16, message: String },

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Parse(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Cancelled")]
    Cancelled,
}

impl ApiError {
    /// Classify a non-2xx response status, keeping the body text as the
    /// error message.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized
        } else if status.is_server_error() {
            ApiError::Server {
                status: status.as_u16(),
                message,
            }
        } else {
            ApiError::Client {
                status: status.as_u16(),
                message,
            }
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    /// Network problems and 5xx are transient; 4xx and parse failures are
    /// terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Server { .. })
    }

    /// Short, user-presentable description of the failure kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            ApiError::Network(_) => "Check your connection and try again.",
            ApiError::Client { .. } => "The request was rejected.",
            ApiError::Server { .. } => "The server ran into a problem. Try again in a moment.",
            ApiError::Parse(_) => "The response could not be understood.",
            ApiError::Session(_) => "Your session could not be read.",
            ApiError::Unauthorized => "Your session has expired. Please sign in again.",
            ApiError::Cancelled => "The search was cancelled.",
        }
    }
}
