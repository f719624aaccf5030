//! User-visible notifications.
//!
//! The [`Notifier`] is the only path from the orchestration layer to the
//! user. It is best-effort (sinks cannot fail the caller), suppressible (the
//! `notifications` setting turns it off entirely) and rate-limited: the same
//! message at the same level is dropped while an identical one was emitted
//! within the dedupe window.

pub mod sink;

pub use sink::{ChannelSink, TracingSink};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::time::{Duration, Instant};
use tracing::trace;

/// Default window in which identical notifications are collapsed.
pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_secs(3);

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "info"),
            Level::Success => write!(f, "success"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Destination for notifications.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn emit(&self, notification: Notification);
}

struct NotifierInner {
    sink: Box<dyn NotificationSink>,
    enabled: AtomicBool,
    window: Duration,
    recent: Mutex<HashMap<(Level, String), Instant>>,
}

/// Cloneable handle to the shared notification pipeline.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

impl Notifier {
    pub fn new(sink: impl NotificationSink + 'static) -> Self {
        Self::with_window(sink, DEFAULT_DEDUPE_WINDOW)
    }

    pub fn with_window(sink: impl NotificationSink + 'static, window: Duration) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                sink: Box::new(sink),
                enabled: AtomicBool::new(true),
                window,
                recent: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Emit a notification. Returns whether it reached the sink.
    pub fn notify(&self, level: Level, message: impl Into<String>) -> bool {
        let message = message.into();
        if !self.is_enabled() {
            trace!(%level, %message, "notifications disabled");
            return false;
        }

        let now = Instant::now();
        {
            let mut recent = self
                .inner
                .recent
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let window = self.inner.window;
            recent.retain(|_, at| now.duration_since(*at) < window);

            let key = (level, message.clone());
            if recent.contains_key(&key) {
                trace!(%level, %message, "duplicate notification dropped");
                return false;
            }
            recent.insert(key, now);
        }

        self.inner.sink.emit(Notification {
            level,
            message,
            at: Utc::now(),
        });
        true
    }

    pub fn info(&self, message: impl Into<String>) -> bool {
        self.notify(Level::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> bool {
        self.notify(Level::Success, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> bool {
        self.notify(Level::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.notify(Level::Error, message)
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled", &self.is_enabled())
            .field("window", &self.inner.window)
            .finish()
    }
}
