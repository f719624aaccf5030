//! Idle-aware periodic refresh.
//!
//! While running, every target is refreshed once immediately and then once
//! per period. An idle timer runs next to the polling loop and stops it when
//! no interaction has been recorded for the idle timeout. Recording activity
//! pushes that deadline back; it does not bring a stopped poller back unless
//! `resume_on_activity` is set.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ActivityClock, Refresh, DEFAULT_IDLE_TIMEOUT, DEFAULT_POLL_INTERVAL};

/// Poller timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Time between two refresh rounds
    pub period: Duration,
    /// Inactivity span after which polling stops
    pub idle_timeout: Duration,
    /// Restart a stopped poller when activity is recorded
    pub resume_on_activity: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_POLL_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            resume_on_activity: false,
        }
    }
}

/// Handle to a running polling loop.
struct Polling {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Polling {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

struct Inner {
    config: PollerConfig,
    /// Everything refreshed on each round
    targets: Vec<Arc<dyn Refresh>>,
    clock: ActivityClock,
    /// Present while polling
    polling: Mutex<Option<Polling>>,
    /// Present while the idle deadline is being watched
    idle_timer: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn polling(&self) -> MutexGuard<'_, Option<Polling>> {
        self.polling.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn idle_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.idle_timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn halt_polling(&self) {
        if let Some(polling) = self.polling().take() {
            polling.cancel.cancel();
        }
    }
}

/// Periodic refresher that pauses itself while the user is away.
///
/// Cloning yields a handle to the same poller.
#[derive(Clone)]
pub struct IdlePoller {
    inner: Arc<Inner>,
}

impl IdlePoller {
    pub fn new(config: PollerConfig, clock: ActivityClock, targets: Vec<Arc<dyn Refresh>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                targets,
                clock,
                polling: Mutex::new(None),
                idle_timer: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.inner.config
    }

    pub fn clock(&self) -> &ActivityClock {
        &self.inner.clock
    }

    /// Whether a polling loop is currently live.
    pub fn is_running(&self) -> bool {
        self.inner.polling().as_ref().is_some_and(Polling::is_live)
    }

    /// Start polling and arm the idle timer.
    ///
    /// Returns `false` without doing anything when a loop is already live.
    pub fn start(&self) -> bool {
        {
            let mut slot = self.inner.polling();
            if slot.as_ref().is_some_and(Polling::is_live) {
                debug!("status polling already running");
                return false;
            }

            let cancel = CancellationToken::new();
            let handle = tokio::spawn(poll_loop(
                self.inner.config.period,
                self.inner.targets.clone(),
                cancel.clone(),
            ));
            *slot = Some(Polling { cancel, handle });
        }

        info!(
            period = ?self.inner.config.period,
            idle_timeout = ?self.inner.config.idle_timeout,
            targets = self.inner.targets.len(),
            "status polling started"
        );
        self.arm_idle_timer();
        true
    }

    /// Stop polling and disarm the idle timer.
    pub fn stop(&self) {
        let was_running = self.is_running();
        self.inner.halt_polling();
        if let Some(timer) = self.inner.idle_timer().take() {
            timer.abort();
        }
        if was_running {
            info!("status polling stopped");
        }
    }

    /// Note a user interaction, pushing the idle deadline back.
    pub fn record_activity(&self) {
        self.inner.clock.touch();
        if self.inner.config.resume_on_activity && !self.is_running() {
            self.start();
        }
    }

    fn arm_idle_timer(&self) {
        let timer = tokio::spawn(idle_watch(
            Arc::downgrade(&self.inner),
            self.inner.clock.clone(),
            self.inner.config.idle_timeout,
        ));
        if let Some(previous) = self.inner.idle_timer().replace(timer) {
            previous.abort();
        }
    }
}

impl std::fmt::Debug for IdlePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdlePoller")
            .field("config", &self.inner.config)
            .field("targets", &self.inner.targets.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.halt_polling();
        if let Some(timer) = self.idle_timer().take() {
            timer.abort();
        }
    }
}

async fn poll_loop(period: Duration, targets: Vec<Arc<dyn Refresh>>, cancel: CancellationToken) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // At most one refresh per target is outstanding.
    let mut in_flight: Vec<Option<JoinHandle<()>>> = targets.iter().map(|_| None).collect();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                for (target, slot) in targets.iter().zip(in_flight.iter_mut()) {
                    if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
                        debug!(target = %target.name(), "previous refresh still pending, skipped");
                        continue;
                    }
                    let target = Arc::clone(target);
                    // One slow service must not hold up the others.
                    *slot = Some(tokio::spawn(async move {
                        debug!(target = %target.name(), "background refresh");
                        target.refresh_in_background().await;
                    }));
                }
            }
        }
    }
}

async fn idle_watch(inner: Weak<Inner>, clock: ActivityClock, idle_timeout: Duration) {
    let armed_at = Instant::now();
    loop {
        let deadline = clock.last_activity().max(armed_at) + idle_timeout;
        if Instant::now() >= deadline {
            break;
        }
        time::sleep_until(deadline).await;
    }

    if let Some(inner) = inner.upgrade() {
        info!(idle_for = ?clock.idle_for(), "user idle, status polling stopped");
        inner.halt_polling();
        // Detach our own handle rather than aborting it.
        inner.idle_timer().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use crate::monitor::MockRefresh;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl Refresh for Counter {
        fn name(&self) -> String {
            "counter".into()
        }

        async fn refresh_in_background(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Counter {
        fn get(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn poller(idle_secs: u64, resume_on_activity: bool) -> (IdlePoller, Arc<Counter>) {
        let counter = Arc::new(Counter::default());
        let config = PollerConfig {
            period: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(idle_secs),
            resume_on_activity,
        };
        let poller = IdlePoller::new(config, ActivityClock::new(), vec![counter.clone() as Arc<dyn Refresh>]);
        (poller, counter)
    }

    async fn settle(secs: u64) {
        time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_round_is_immediate_then_periodic() {
        let (poller, counter) = poller(60, false);
        assert!(poller.start());

        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.get(), 1);

        time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(counter.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_a_noop() {
        let (poller, counter) = poller(60, false);
        assert!(poller.start());
        assert!(!poller.start());

        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_stops_polling() {
        let (poller, counter) = poller(12, false);
        poller.start();

        // Rounds at 0s, 5s and 10s; idle at 12s.
        settle(30).await;
        assert!(!poller.is_running());
        assert_eq!(counter.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_pushes_idle_deadline_back() {
        let (poller, counter) = poller(12, false);
        poller.start();

        settle(10).await;
        time::sleep(Duration::from_millis(1)).await;
        poller.record_activity();

        // Deadline moves to ~22s: rounds at 15s and 20s are added.
        settle(30).await;
        assert!(!poller.is_running());
        assert_eq!(counter.get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_after_idle_stop_does_not_restart_by_default() {
        let (poller, counter) = poller(12, false);
        poller.start();
        settle(20).await;
        assert!(!poller.is_running());

        poller.record_activity();
        settle(20).await;
        assert!(!poller.is_running());
        assert_eq!(counter.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_after_idle_stop_resumes_when_configured() {
        let (poller, counter) = poller(12, true);
        poller.start();
        settle(20).await;
        assert!(!poller.is_running());

        poller.record_activity();
        assert!(poller.is_running());
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_rounds() {
        let (poller, counter) = poller(60, false);
        poller.start();
        time::sleep(Duration::from_millis(1)).await;

        poller.stop();
        settle(20).await;
        assert!(!poller.is_running());
        assert_eq!(counter.get(), 1);
    }

    /// Never finishes a refresh.
    #[derive(Default)]
    struct Stalled(AtomicUsize);

    #[async_trait]
    impl Refresh for Stalled {
        fn name(&self) -> String {
            "stalled".into()
        }

        async fn refresh_in_background(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pending_refresh_is_not_stacked() {
        let stalled = Arc::new(Stalled::default());
        let counter = Arc::new(Counter::default());
        let config = PollerConfig {
            period: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            resume_on_activity: false,
        };
        let poller = IdlePoller::new(
            config,
            ActivityClock::new(),
            vec![stalled.clone() as Arc<dyn Refresh>, counter.clone()],
        );
        poller.start();

        // Rounds at 0s, 5s, 10s and 15s.
        time::sleep(Duration::from_millis(15_001)).await;
        assert_eq!(stalled.0.load(Ordering::SeqCst), 1);
        assert_eq!(counter.get(), 4);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn every_target_is_refreshed() {
        let mut first = MockRefresh::new();
        first.expect_name().return_const("agent".to_string());
        first.expect_refresh_in_background().times(1).return_const(());
        let mut second = MockRefresh::new();
        second.expect_name().return_const("bot".to_string());
        second.expect_refresh_in_background().times(1).return_const(());

        let poller = IdlePoller::new(
            PollerConfig::default(),
            ActivityClock::new(),
            vec![Arc::new(first) as Arc<dyn Refresh>, Arc::new(second)],
        );
        poller.start();
        time::sleep(Duration::from_millis(1)).await;
        poller.stop();
    }
}
