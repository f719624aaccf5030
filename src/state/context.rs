//! The object graph shared by the UI and background tasks.

use std::sync::Arc;

use crate::app::AppConfig;
use crate::connection::{BrowserPool, ConnectionMachine, ServiceId, ServiceSpec};
use crate::gateway::SharedGateway;
use crate::history::HistoryChannel;
use crate::monitor::{ActivityClock, IdlePoller, Refresh};
use crate::notify::{NotificationSink, Notifier};
use crate::settings::SettingsStore;

/// Owns every machine and channel for one panel session.
///
/// All members are cheap to clone handles, so actions can move what they
/// need into spawned tasks.
pub struct PanelContext {
    /// Notifier shared by every component
    pub notifier: Notifier,
    /// Agent process connection
    pub agent: Arc<ConnectionMachine>,
    /// Messaging bot connection
    pub bot: Arc<ConnectionMachine>,
    /// Browser-automation pool connection
    pub browser: Arc<ConnectionMachine>,
    /// Profile listing and start on top of the browser machine
    pub browser_pool: Arc<BrowserPool>,
    /// Command log
    pub history: Arc<HistoryChannel>,
    /// Saved panel settings
    pub settings: Arc<SettingsStore>,
    /// Last user interaction
    pub clock: ActivityClock,
    /// Background refresher for every machine and the history
    pub poller: IdlePoller,
}

impl PanelContext {
    pub fn new(
        config: &AppConfig,
        gateway: SharedGateway,
        sink: impl NotificationSink + 'static,
    ) -> Self {
        let notifier = Notifier::with_window(sink, config.notification_window());
        let machine = |spec: ServiceSpec| {
            Arc::new(ConnectionMachine::new(spec, gateway.clone(), notifier.clone()))
        };
        let agent = machine(ServiceSpec::agent());
        let bot = machine(ServiceSpec::bot());
        let browser = machine(ServiceSpec::browser_pool());

        let browser_pool = Arc::new(BrowserPool::new(
            browser.clone(),
            gateway.clone(),
            notifier.clone(),
        ));
        let history = Arc::new(HistoryChannel::new(gateway.clone(), config.history_limit));
        let settings = Arc::new(SettingsStore::new(
            config.initial_settings(),
            gateway,
            notifier.clone(),
        ));

        let clock = ActivityClock::new();
        let targets: Vec<Arc<dyn Refresh>> = vec![
            agent.clone(),
            bot.clone(),
            browser.clone(),
            history.clone(),
        ];
        let poller = IdlePoller::new(config.poller(), clock.clone(), targets);

        Self {
            notifier,
            agent,
            bot,
            browser,
            browser_pool,
            history,
            settings,
            clock,
            poller,
        }
    }

    pub fn machine(&self, id: ServiceId) -> &Arc<ConnectionMachine> {
        match id {
            ServiceId::Agent => &self.agent,
            ServiceId::Bot => &self.bot,
            ServiceId::BrowserPool => &self.browser,
        }
    }

    pub fn machines(&self) -> impl Iterator<Item = &Arc<ConnectionMachine>> {
        ServiceId::ALL.into_iter().map(|id| self.machine(id))
    }
}
