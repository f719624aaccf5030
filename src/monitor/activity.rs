//! Last-interaction tracking.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Shared timestamp of the most recent user interaction.
///
/// Cloning yields a handle to the same clock.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    /// Instant of the last recorded interaction
    last: Arc<Mutex<Instant>>,
}

impl ActivityClock {
    /// Create a clock that considers "now" the last interaction.
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Record an interaction at the current instant.
    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How long ago the last interaction happened.
    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn touch_resets_idle_time() {
        let clock = ActivityClock::new();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(clock.idle_for(), Duration::from_secs(4));

        let shared = clock.clone();
        shared.touch();
        assert_eq!(clock.idle_for(), Duration::ZERO);
    }
}
