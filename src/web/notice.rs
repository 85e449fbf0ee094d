use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

impl NoticeKind {
    pub fn css_class(self) -> &'static str {
        match self {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

/// The single transient status message. Showing a new one replaces the
/// current one and restarts the dismiss timer.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    current: Arc<Mutex<Option<Notice>>>,
    generation: Arc<AtomicU64>,
    ttl: Duration,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    /// Must be called from within a tokio runtime; the dismiss timer is a task.
    pub fn show(&self, text: impl Into<String>, kind: NoticeKind) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.slot() = Some(Notice {
            text: text.into(),
            kind,
        });

        let board = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(board.ttl).await;
            let mut slot = board.slot();
            // only dismiss if nothing newer replaced this message
            if board.generation.load(Ordering::SeqCst) == generation {
                *slot = None;
            }
        });
    }

    pub fn current(&self) -> Option<Notice> {
        self.slot().clone()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Notice>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_TTL)
    }
}
