//! Notification data models

use serde::{Deserialize, Serialize};

/// Notification kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Error,
    Info,
}

/// A user-facing notification, presented as a dismissible toast by the
/// host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: Option<String>,
}

impl Notification {
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            body: Some(body.into()),
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: title.into(),
            body: None,
        }
    }
}
