//! User notifications module
//!
//! The presenter itself (toast rendering, stacking, dismissal) lives in
//! the host application; this module only defines the port the search
//! core publishes through.

mod models;

pub use models::{Notification, NotificationKind};

/// Port to the host's notification presenter.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes notifications to the log instead of a UI surface.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let body = notification.body.as_deref().unwrap_or("");
        match notification.kind {
            NotificationKind::Error => {
                tracing::error!(title = %notification.title, body = %body, "notification")
            }
            NotificationKind::Info => {
                tracing::info!(title = %notification.title, body = %body, "notification")
            }
        }
    }
}
