//! Application state management.
//!
//! [`PanelContext`] owns the live machines and channels. [`AppState`] is the
//! UI's copy of what it needs to draw, refreshed from the context once per
//! loop iteration, plus everything that only exists on screen: selection,
//! forms, input text and toasts.

mod context;
mod form;

pub use context::PanelContext;
pub use form::{BotField, BotForm, BrowserForm, Editable};

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::connection::{ConnectionRecord, ServiceId};
use crate::history::HistoryEntry;
use crate::notify::Notification;
use crate::settings::Settings;

/// Temporal state of background polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporality {
    /// Poller running.
    Live,
    /// Poller stopped, by hand or after inactivity.
    Paused,
}

/// Where typed characters go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Keys resolve through the key map.
    Normal,
    /// Keys edit the command line.
    Command,
    /// Keys edit the open connection form.
    Form,
}

/// A notification shown on screen until it expires.
#[derive(Debug, Clone)]
pub struct Toast {
    pub notification: Notification,
    pub expires_at: Instant,
}

/// Maximum number of toasts on screen at once.
const MAX_TOASTS: usize = 4;

/// Application state.
pub struct AppState {
    /// Latest record of every service
    pub records: BTreeMap<ServiceId, ConnectionRecord>,
    /// Command log, oldest first
    pub history: Vec<HistoryEntry>,
    /// Saved panel settings
    pub settings: Settings,
    /// Whether the poller is running
    pub temporality: Temporality,
    /// Index into [`ServiceId::ALL`] of the highlighted service
    pub selected: usize,
    /// Where keystrokes go
    pub input_mode: InputMode,
    /// Command being typed
    pub command_input: String,
    /// Bot connection form
    pub bot_form: BotForm,
    /// Browser-pool connection form
    pub browser_form: BrowserForm,
    /// Notifications on screen, oldest first
    pub toasts: VecDeque<Toast>,
    /// How long a toast stays up
    pub toast_ttl: Duration,
    /// Animation frame for spinners.
    pub animation_frame: usize,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(toast_ttl: Duration) -> Self {
        Self {
            records: ServiceId::ALL
                .into_iter()
                .map(|id| (id, ConnectionRecord::new(id)))
                .collect(),
            history: Vec::new(),
            settings: Settings::default(),
            temporality: Temporality::Paused,
            selected: 0,
            input_mode: InputMode::Normal,
            command_input: String::new(),
            bot_form: BotForm::default(),
            browser_form: BrowserForm::default(),
            toasts: VecDeque::new(),
            toast_ttl,
            animation_frame: 0,
        }
    }

    /// Copy the current view of every live component.
    pub fn sync(&mut self, context: &PanelContext) {
        for machine in context.machines() {
            self.records.insert(machine.id(), machine.record());
        }
        self.history = context.history.entries();
        self.settings = context.settings.current();
        self.temporality = if context.poller.is_running() {
            Temporality::Live
        } else {
            Temporality::Paused
        };
    }

    pub fn selected_service(&self) -> ServiceId {
        ServiceId::ALL[self.selected % ServiceId::ALL.len()]
    }

    pub fn select_next_service(&mut self) {
        self.selected = (self.selected + 1) % ServiceId::ALL.len();
    }

    pub fn select_prev_service(&mut self) {
        self.selected = (self.selected + ServiceId::ALL.len() - 1) % ServiceId::ALL.len();
    }

    pub fn record(&self, id: ServiceId) -> Option<&ConnectionRecord> {
        self.records.get(&id)
    }

    /// The form of the highlighted service, if it takes connection details.
    pub fn selected_form(&mut self) -> Option<&mut dyn Editable> {
        match self.selected_service() {
            ServiceId::Agent => None,
            ServiceId::Bot => Some(&mut self.bot_form),
            ServiceId::BrowserPool => Some(&mut self.browser_form),
        }
    }

    pub fn push_toast(&mut self, notification: Notification) {
        self.toasts.push_back(Toast {
            notification,
            expires_at: Instant::now() + self.toast_ttl,
        });
        while self.toasts.len() > MAX_TOASTS {
            self.toasts.pop_front();
        }
    }

    /// Drop expired toasts and advance animations.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.toasts.retain(|toast| toast.expires_at > now);
        self.animation_frame = (self.animation_frame + 1) % 4;
    }
}
