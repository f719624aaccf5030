//! Background status polling.
//!
//! The panel keeps its view of the backend fresh by polling while the user
//! is active. This module provides:
//!
//! - [`ActivityClock`], the shared record of the last user interaction
//! - [`IdlePoller`], which refreshes every registered [`Refresh`] target on a
//!   fixed period and stops itself once the user has been idle long enough

pub mod activity;
pub mod poller;

pub use activity::ActivityClock;
pub use poller::{IdlePoller, PollerConfig};

use std::time::Duration;

use async_trait::async_trait;

/// Default polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default inactivity span after which polling stops.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Something the poller can refresh.
///
/// Implementations must not surface failures to the user; a background
/// refresh that fails simply leaves the previous view in place.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Refresh: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> String;

    async fn refresh_in_background(&self);
}
