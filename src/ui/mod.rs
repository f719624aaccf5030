//! UI components for the panel.
//!
//! The [`Ui`] controller owns the view state and draws one of the views
//! from an [`AppState`] snapshot. It never talks to the backend; every
//! effect goes through the app's dispatch.

mod dashboard;
pub mod help;
pub mod history;
pub mod settings_view;
pub mod theme;
pub mod widgets;

pub use dashboard::DashboardView;
pub use help::HelpView;
pub use history::HistoryView;
pub use settings_view::SettingsView;
pub use theme::Theme;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Tabs};

use crate::connection::ServiceStatus;
use crate::event::KeyMap;
use crate::state::{AppState, InputMode, Temporality};
use widgets::ToastStack;

/// Available views in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Services and connection forms
    Dashboard,
    /// Command log and command line
    History,
    /// Panel settings
    Settings,
}

impl ViewState {
    const ALL: [ViewState; 3] = [ViewState::Dashboard, ViewState::History, ViewState::Settings];

    fn title(&self) -> &'static str {
        match self {
            ViewState::Dashboard => "Dashboard [d]",
            ViewState::History => "History [h]",
            ViewState::Settings => "Settings [s]",
        }
    }
}

/// Main UI controller.
pub struct Ui {
    /// Current view state
    state: ViewState,
    /// Whether to show help overlay
    show_help: bool,
    /// UI theme
    theme: Theme,
    /// Terminal width
    terminal_width: u16,
    /// Terminal height
    terminal_height: u16,
}

impl Ui {
    /// Create a new UI controller.
    pub fn new() -> Self {
        Self {
            state: ViewState::Dashboard,
            show_help: false,
            theme: Theme::default(),
            terminal_width: 80,
            terminal_height: 24,
        }
    }

    /// Get the current view state.
    pub fn current_view(&self) -> &ViewState {
        &self.state
    }

    pub fn navigate_to(&mut self, view: ViewState) {
        self.state = view;
    }

    /// Toggle help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn is_help_shown(&self) -> bool {
        self.show_help
    }

    /// Handle terminal resize events
    pub fn handle_resize(&mut self, width: u16, height: u16) {
        self.terminal_width = width;
        self.terminal_height = height;
    }

    pub fn terminal_size(&self) -> (u16, u16) {
        (self.terminal_width, self.terminal_height)
    }

    /// Render the UI.
    pub fn render(&self, frame: &mut Frame, app_state: &AppState, keymap: &KeyMap) {
        let area = frame.size();
        if area.height < 4 {
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1), Constraint::Length(1)])
            .split(area);

        self.render_tabs(frame, chunks[0]);
        match self.state {
            ViewState::Dashboard => DashboardView::render(frame, chunks[1], app_state, &self.theme),
            ViewState::History => HistoryView::render(frame, chunks[1], app_state, &self.theme),
            ViewState::Settings => {
                SettingsView::render(frame, chunks[1], app_state, keymap, &self.theme)
            }
        }
        self.render_status_line(frame, chunks[2], app_state);

        // Help overlay, then toasts, always on top
        if self.show_help {
            HelpView::render(frame, chunks[1], keymap, &self.theme);
        }
        frame.render_widget(ToastStack::new(&app_state.toasts, &self.theme), chunks[1]);
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = ViewState::ALL.iter().map(|view| Line::from(view.title())).collect();
        let selected = ViewState::ALL.iter().position(|view| *view == self.state).unwrap_or(0);
        let tabs = Tabs::new(titles)
            .select(selected)
            .style(self.theme.help_style)
            .highlight_style(self.theme.header_style)
            .divider("|");
        frame.render_widget(tabs, area);
    }

    fn render_status_line(&self, frame: &mut Frame, area: Rect, app_state: &AppState) {
        let (polling, polling_style) = match app_state.temporality {
            Temporality::Live => ("LIVE", self.theme.status_live),
            Temporality::Paused => ("PAUSED", self.theme.status_paused),
        };

        let connected = app_state
            .records
            .values()
            .filter(|record| record.status == ServiceStatus::Connected)
            .count();
        let mode = match app_state.input_mode {
            InputMode::Normal => "",
            InputMode::Command => " | typing command",
            InputMode::Form => " | editing form",
        };

        let status_text = format!(
            "{polling} | Connected: {connected}/{} | History: {}{mode} | Press ? for help",
            app_state.records.len(),
            app_state.history.len(),
        );
        frame.render_widget(Paragraph::new(status_text).style(polling_style), area);
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}
