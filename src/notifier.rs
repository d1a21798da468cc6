use async_trait::async_trait;

use crate::utils::error::Result;

/// Delivers a rendered message to a user.
///
/// One attempt per call. Callers log failures; nothing is retried or queued.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: i64, text: &str) -> Result<()>;
}

/// Writes messages to the log instead of delivering them.
///
/// Used by `check-once --dry-run`.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, user_id: i64, text: &str) -> Result<()> {
        tracing::info!(user_id, "Notification (not delivered):\n{}", text);
        Ok(())
    }
}
