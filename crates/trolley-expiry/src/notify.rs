//! User-facing notices.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    StockExceeded,
    CartExpired,
    SessionExpired,
}

/// A modal alert for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn stock_exceeded(product_name: &str, size_id: u64, available: u32) -> Self {
        Self {
            kind: NoticeKind::StockExceeded,
            title: "Notice".to_string(),
            message: format!(
                "Sorry, only {} units are available for {} (size: {}).",
                available, product_name, size_id
            ),
        }
    }

    pub fn cart_expired() -> Self {
        Self {
            kind: NoticeKind::CartExpired,
            title: "Cart emptied".to_string(),
            message: "Your cart has been emptied due to inactivity.".to_string(),
        }
    }

    pub fn session_expired() -> Self {
        Self {
            kind: NoticeKind::SessionExpired,
            title: "Session expired".to_string(),
            message: "Your session has expired. Please log in again.".to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Sink for user-visible notices.
pub trait Notifier: Send + Sync + fmt::Debug {
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        tracing::warn!(kind = ?notice.kind, title = %notice.title, "{}", notice.message);
    }
}

/// Keeps every notice it receives. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notices received so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices.lock().iter().map(|n| n.kind).collect()
    }

    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}
