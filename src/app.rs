//! Application state and logic.
//!
//! This module contains the configuration, the main loop and the single
//! dispatch point that turns [`Action`]s into calls on the panel context.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{Stream, StreamExt};
use ratatui::backend::Backend;
use ratatui::Terminal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::auth::Credentials;
use crate::connection::{BrowserProfile, ConnectPayload, RefreshMode, ServiceId};
use crate::error::PanelError;
use crate::event::{Action, Event, KeyMap};
use crate::gateway::SharedGateway;
use crate::monitor::PollerConfig;
use crate::notify::{ChannelSink, Notification, TracingSink};
use crate::settings::Settings;
use crate::state::{AppState, BotField, InputMode, PanelContext};
use crate::ui::{Ui, ViewState};

/// Config file looked up when `PANEL_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "panel.toml";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub tick_rate_ms: u64,
    pub poll_interval_ms: u64,
    pub idle_timeout_ms: u64,
    pub history_limit: usize,
    pub notification_window_ms: u64,
    pub toast_ttl_ms: u64,
    pub debug_mode: bool,
    pub auto_start: bool,
    pub notifications: bool,
    pub resume_on_activity: bool,
    pub log_file: PathBuf,
    /// Backend account used to log in at startup
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".into(),
            tick_rate_ms: 250,
            poll_interval_ms: 5_000,
            idle_timeout_ms: 15_000,
            history_limit: crate::history::DEFAULT_HISTORY_LIMIT,
            notification_window_ms: 3_000,
            toast_ttl_ms: 3_000,
            debug_mode: false,
            auto_start: false,
            notifications: true,
            resume_on_activity: false,
            log_file: PathBuf::from("panel-tui.log"),
            email: None,
            password: None,
        }
    }
}

impl AppConfig {
    /// Load from `PANEL_CONFIG` (or `panel.toml`), then `PANEL__*` variables.
    pub fn load() -> Result<Self, PanelError> {
        let path = std::env::var_os("PANEL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Load from `path` if it exists, then `PANEL__*` variables.
    pub fn load_from(path: &Path) -> Result<Self, PanelError> {
        let config = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("PANEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(1))
    }

    pub fn notification_window(&self) -> Duration {
        Duration::from_millis(self.notification_window_ms)
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.toast_ttl_ms)
    }

    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            period: Duration::from_millis(self.poll_interval_ms.max(1)),
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            resume_on_activity: self.resume_on_activity,
        }
    }

    /// Login details, when both halves are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(Credentials::new(email.as_str(), password.as_str())),
            _ => None,
        }
    }

    pub fn initial_settings(&self) -> Settings {
        Settings {
            debug_mode: self.debug_mode,
            auto_start: self.auto_start,
            notifications: self.notifications,
        }
    }
}

/// Results of spawned work that the UI has to fold back in.
#[derive(Debug)]
enum UiUpdate {
    Profiles(Vec<BrowserProfile>),
}

/// Main application.
pub struct App {
    /// Machines, history, settings and poller
    context: PanelContext,
    /// What the UI draws
    state: AppState,
    /// Normal-mode key bindings
    keymap: KeyMap,
    /// Current view controller
    ui: Ui,
    /// Notifications from the channel sink, shown as toasts
    notifications: mpsc::UnboundedReceiver<Notification>,
    /// Results of spawned work
    updates_tx: mpsc::UnboundedSender<UiUpdate>,
    updates_rx: mpsc::UnboundedReceiver<UiUpdate>,
    /// Should the application exit?
    should_quit: bool,
}

impl App {
    /// Creates a new application instance.
    pub fn new(config: &AppConfig, gateway: SharedGateway) -> Result<Self> {
        let (sink, notifications) = ChannelSink::new();
        let context = PanelContext::new(config, gateway, (sink, TracingSink));
        let keymap = KeyMap::standard()?;
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        Ok(Self {
            context,
            state: AppState::new(config.toast_ttl()),
            keymap,
            ui: Ui::new(),
            notifications,
            updates_tx,
            updates_rx,
            should_quit: false,
        })
    }

    pub fn context(&self) -> &PanelContext {
        &self.context
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn ui(&self) -> &Ui {
        &self.ui
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Start polling and, if configured, connect the agent.
    pub fn start(&mut self) {
        self.context.poller.start();
        if self.context.settings.current().auto_start {
            info!("auto start enabled, connecting agent");
            self.dispatch_for(ServiceId::Agent, Action::Connect);
        }
    }

    /// Runs the application main loop.
    pub async fn run<B, S>(&mut self, terminal: &mut Terminal<B>, events: &mut S) -> Result<()>
    where
        B: Backend,
        S: Stream<Item = Event> + Unpin,
    {
        self.start();

        while !self.should_quit {
            self.state.sync(&self.context);
            terminal.draw(|frame| self.ui.render(frame, &self.state, &self.keymap))?;

            tokio::select! {
                event = events.next() => match event {
                    Some(event) => self.handle_event(event),
                    None => self.should_quit = true,
                },
                Some(notification) = self.notifications.recv() => {
                    self.state.push_toast(notification);
                }
                Some(update) = self.updates_rx.recv() => self.apply(update),
            }
        }

        self.context.poller.stop();
        Ok(())
    }

    /// Handles input and other events.
    pub fn handle_event(&mut self, event: Event) {
        if event.is_user_activity() {
            self.context.poller.record_activity();
        }
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key_event(key),
            Event::Key(_) | Event::Mouse(_) => {}
            Event::Resize(width, height) => self.ui.handle_resize(width, height),
            Event::Tick => self.state.tick(),
        }
    }

    /// Handles keyboard input according to the input mode.
    fn handle_key_event(&mut self, key: KeyEvent) {
        match self.state.input_mode {
            InputMode::Normal => {
                if let Some(action) = self.keymap.resolve(&key) {
                    self.dispatch(action);
                }
            }
            InputMode::Command => self.handle_command_key(key),
            InputMode::Form => self.handle_form_key(key),
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.state.input_mode = InputMode::Normal,
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.state.command_input);
                let history = self.context.history.clone();
                tokio::spawn(async move {
                    history.submit(&command).await;
                });
            }
            KeyCode::Backspace => {
                self.state.command_input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.state.command_input.push(c);
            }
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let service = self.state.selected_service();
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match (service, key.code) {
            (_, KeyCode::Esc) => self.state.input_mode = InputMode::Normal,
            (_, KeyCode::Enter) => {
                self.state.input_mode = InputMode::Normal;
                self.dispatch(Action::Connect);
            }
            (ServiceId::Bot, KeyCode::Char(' '))
                if self.state.bot_form.focused() == BotField::UpdateMethod =>
            {
                self.state.bot_form.toggle_update_method();
            }
            (ServiceId::BrowserPool, KeyCode::Char(' ')) => self.state.browser_form.toggle_selected(),
            (ServiceId::BrowserPool, KeyCode::Up) => self.state.browser_form.move_cursor(false),
            (ServiceId::BrowserPool, KeyCode::Down) => self.state.browser_form.move_cursor(true),
            (ServiceId::BrowserPool, KeyCode::Char('f')) if ctrl => self.dispatch(Action::FetchProfiles),
            (ServiceId::BrowserPool, KeyCode::Char('s')) if ctrl => self.dispatch(Action::StartProfiles),
            (_, code) => {
                let Some(form) = self.state.selected_form() else {
                    self.state.input_mode = InputMode::Normal;
                    return;
                };
                match code {
                    KeyCode::Tab => form.next_field(),
                    KeyCode::Backspace => form.backspace(),
                    KeyCode::Char(c) if !ctrl => form.push_char(c),
                    _ => {}
                }
            }
        }
    }

    /// The one place actions take effect.
    pub fn dispatch(&mut self, action: Action) {
        let service = self.state.selected_service();
        self.dispatch_for(service, action);
    }

    fn dispatch_for(&mut self, service: ServiceId, action: Action) {
        debug!(?action, %service, "dispatch");
        match action {
            Action::Quit => {
                self.context.poller.stop();
                self.should_quit = true;
            }
            Action::ToggleHelp => self.ui.toggle_help(),
            Action::TogglePolling => {
                if self.context.poller.is_running() {
                    self.context.poller.stop();
                } else {
                    self.context.poller.start();
                }
            }
            Action::ShowDashboard => self.ui.navigate_to(ViewState::Dashboard),
            Action::ShowHistory => self.ui.navigate_to(ViewState::History),
            Action::ShowSettings => self.ui.navigate_to(ViewState::Settings),
            Action::NextItem => self.state.select_next_service(),
            Action::PrevItem => self.state.select_prev_service(),
            Action::Connect => {
                let payload = self.payload_for(service);
                let machine = self.context.machine(service).clone();
                spawn_op("connect", async move { machine.connect(payload).await });
            }
            Action::Disconnect => {
                let machine = self.context.machine(service).clone();
                spawn_op("disconnect", async move { machine.disconnect().await });
            }
            Action::Refresh => {
                let machine = self.context.machine(service).clone();
                spawn_op("refresh", async move { machine.refresh(RefreshMode::Explicit).await });
            }
            Action::RefreshAll => {
                for machine in self.context.machines() {
                    let machine = machine.clone();
                    spawn_op("refresh", async move { machine.refresh(RefreshMode::Explicit).await });
                }
                let history = self.context.history.clone();
                spawn_op("history refresh", async move { history.refresh().await });
            }
            Action::EditForm => {
                self.ui.navigate_to(ViewState::Dashboard);
                if self.state.selected_form().is_some() {
                    self.state.input_mode = InputMode::Form;
                }
            }
            Action::FocusCommand => {
                self.ui.navigate_to(ViewState::History);
                self.state.input_mode = InputMode::Command;
            }
            Action::ClearHistory => self.context.history.clear(),
            Action::ToggleSetting(key) => {
                let settings = self.context.settings.clone();
                spawn_op("save settings", async move { settings.toggle(key).await });
            }
            Action::FetchProfiles => {
                let pool = self.context.browser_pool.clone();
                let target = self.state.browser_form.target();
                let updates = self.updates_tx.clone();
                spawn_op("fetch profiles", async move {
                    let profiles = pool.fetch_profiles(&target).await?;
                    // Receiver gone means the app is exiting.
                    let _ = updates.send(UiUpdate::Profiles(profiles));
                    Ok(())
                });
            }
            Action::StartProfiles => {
                let pool = self.context.browser_pool.clone();
                let target = self.state.browser_form.target();
                let ids = self.state.browser_form.selected_ids();
                spawn_op("start profiles", async move { pool.start_profiles(&target, &ids).await });
            }
        }
    }

    fn payload_for(&self, service: ServiceId) -> ConnectPayload {
        match service {
            ServiceId::Agent => ConnectPayload::None,
            ServiceId::Bot => self.state.bot_form.payload(),
            ServiceId::BrowserPool => self.state.browser_form.payload(),
        }
    }

    fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Profiles(profiles) => self.state.browser_form.set_profiles(profiles),
        }
    }
}

/// Run a user-initiated operation in the background.
///
/// Failures were already reported by the component itself; only the log
/// line is added here.
fn spawn_op<T, F>(what: &'static str, operation: F)
where
    T: Send + 'static,
    F: Future<Output = Result<T, PanelError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = operation.await {
            if err.is_silent() {
                debug!(operation = what, error = %err, "operation skipped");
            } else {
                debug!(operation = what, error = %err, "operation failed");
            }
        }
    });
}
