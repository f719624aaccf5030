//! Notification sinks.

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{Level, Notification, NotificationSink};

/// Forwards notifications to the UI loop, which renders them as toasts.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn emit(&self, notification: Notification) {
        // Receiver gone means the UI is shutting down.
        let _ = self.tx.send(notification);
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn emit(&self, notification: Notification) {
        let Notification { level, message, .. } = notification;
        match level {
            Level::Info | Level::Success => info!(%level, "{message}"),
            Level::Warning => warn!("{message}"),
            Level::Error => error!("{message}"),
        }
    }
}

/// Both sinks get every notification.
impl<A: NotificationSink, B: NotificationSink> NotificationSink for (A, B) {
    fn emit(&self, notification: Notification) {
        self.0.emit(notification.clone());
        self.1.emit(notification);
    }
}
