//! Error types for the orchestration layer.
//!
//! Every fallible operation in the library returns [`PanelError`]. Which
//! variants reach the user is decided by the caller: user-initiated actions
//! surface them through the notifier, background refreshes swallow them, and
//! stale or rejected operations are never shown at all.

use thiserror::Error;

use crate::connection::{ServiceId, ServiceStatus};

/// Message used for every transport-level failure.
pub const NETWORK_ERROR: &str = "network error";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PanelError {
    /// Input rejected locally before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("network error")]
    Transport,

    /// The backend answered but reported `success: false`.
    #[error("{0}")]
    Backend(String),

    /// The backend answered with a body the caller cannot interpret.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A newer operation superseded this one; its result was discarded.
    #[error("stale response for {service} (seq {seq})")]
    StateConflict { service: ServiceId, seq: u64 },

    /// A newer history refresh or append superseded this refresh.
    #[error("stale history response (seq {seq})")]
    StaleHistory { seq: u64 },

    #[error("{service} is busy ({status})")]
    Busy {
        service: ServiceId,
        status: ServiceStatus,
    },

    #[error("cannot {action} {service} while {status}")]
    InvalidTransition {
        service: ServiceId,
        status: ServiceStatus,
        action: &'static str,
    },

    #[error("key already bound: {0}")]
    DuplicateBinding(String),

    #[error("config error: {0}")]
    Config(String),
}

impl PanelError {
    /// Whether this error should ever be shown to the user.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            PanelError::StateConflict { .. }
                | PanelError::StaleHistory { .. }
                | PanelError::Busy { .. }
                | PanelError::InvalidTransition { .. }
        )
    }
}

impl From<config::ConfigError> for PanelError {
    fn from(err: config::ConfigError) -> Self {
        PanelError::Config(err.to_string())
    }
}
