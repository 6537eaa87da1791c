//! User-facing notices.
//!
//! [`Notifier`] is the toast channel: every notice is forwarded to the `log`
//! facade and broadcast to subscribers (SSE clients, the CLI renderer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::MAX_NOTICES;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single user-visible notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Broadcasts notices to every subscriber.
///
/// Cheap to clone; clones share the channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(MAX_NOTICES);
        Self { sender }
    }

    /// Log a notice and send it to all subscribers.
    pub fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => log::info!("{}", notice.message),
            NoticeLevel::Warning => log::warn!("{}", notice.message),
            NoticeLevel::Error => log::error!("{}", notice.message),
        }

        // No subscribers is fine
        let _ = self.sender.send(notice);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Info, message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Success, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notice::new(NoticeLevel::Error, message));
    }

    /// Receiver for streaming notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// "file" / "files" depending on count.
pub fn plural_files(count: usize) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{} files", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notices() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.success("2 files uploaded successfully!");
        notifier.error("Failed to upload 1 file");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.level, NoticeLevel::Success);
        assert!(first.message.contains("2 files"));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.level, NoticeLevel::Error);
    }

    #[test]
    fn test_notify_without_subscribers() {
        Notifier::new().info("nobody listening");
    }

    #[test]
    fn test_plural_files() {
        assert_eq!(plural_files(1), "1 file");
        assert_eq!(plural_files(3), "3 files");
    }
}
