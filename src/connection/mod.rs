//! Connection state machines for the supervised services.
//!
//! One generic [`ConnectionMachine`] is instantiated per service from a
//! [`ServiceSpec`]. The machine owns its [`ConnectionRecord`]; everybody else
//! reads snapshots through a `watch` channel.

pub mod browser;
mod machine;
pub mod service;

pub use browser::{BrowserPool, BrowserProfile};
pub use machine::ConnectionMachine;
pub use service::{BotLink, ConnectPayload, PoolKind, PoolTarget, ServiceSpec, UpdateMethod};

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// The externally managed integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceId {
    Agent,
    Bot,
    BrowserPool,
}

impl ServiceId {
    pub const ALL: [ServiceId; 3] = [ServiceId::Agent, ServiceId::Bot, ServiceId::BrowserPool];

    /// Human-readable name used at the start of messages.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceId::Agent => "Agent",
            ServiceId::Bot => "Telegram bot",
            ServiceId::BrowserPool => "Browser pool",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceId::Agent => write!(f, "agent"),
            ServiceId::Bot => write!(f, "bot"),
            ServiceId::BrowserPool => write!(f, "browser pool"),
        }
    }
}

/// Connection status of one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

impl ServiceStatus {
    /// A transitional status always has an operation in flight.
    pub fn is_transitional(&self) -> bool {
        matches!(self, ServiceStatus::Connecting | ServiceStatus::Disconnecting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Disconnected => "disconnected",
            ServiceStatus::Connecting => "connecting",
            ServiceStatus::Connected => "connected",
            ServiceStatus::Disconnecting => "disconnecting",
            ServiceStatus::Error => "error",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a refresh was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// The user asked for it; failures are surfaced.
    Explicit,
    /// The poller asked for it; failures are swallowed and in-flight user
    /// operations are left alone.
    Background,
}

/// Current view of one service's connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub service: ServiceId,
    pub status: ServiceStatus,
    pub last_error: Option<String>,
    /// Opaque identity returned by the backend on connect.
    pub credentials: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl ConnectionRecord {
    pub fn new(service: ServiceId) -> Self {
        Self {
            service,
            status: ServiceStatus::Disconnected,
            last_error: None,
            credentials: None,
            updated_at: Utc::now(),
        }
    }
}
