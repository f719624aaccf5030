//! UI theme definition.

use ratatui::style::{Color, Modifier, Style};

use crate::connection::ServiceStatus;
use crate::history::Origin;
use crate::notify::Level;

/// Theme for the application UI.
#[derive(Debug, Clone)]
pub struct Theme {
    // Basic styles
    pub normal_text: Style,
    pub selected_style: Style,
    pub block_style: Style,
    pub focused_block_style: Style,
    pub header_style: Style,
    pub label_style: Style,
    pub value_style: Style,

    // Status line styles
    pub error_style: Style,
    pub help_style: Style,
    pub status_live: Style,
    pub status_paused: Style,

    // Key styles
    pub key_style: Style,

    // Connection status styles
    pub connected_style: Style,
    pub transitional_style: Style,
    pub disconnected_style: Style,
    pub failed_style: Style,

    // History styles
    pub user_entry_style: Style,
    pub service_entry_style: Style,
    pub timestamp_style: Style,

    // Toast styles
    pub info_style: Style,
    pub success_style: Style,
    pub warning_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            // Basic styles
            normal_text: Style::default().fg(Color::White),
            selected_style: Style::default().fg(Color::Black).bg(Color::White),
            block_style: Style::default(),
            focused_block_style: Style::default().fg(Color::Cyan),
            header_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            label_style: Style::default().fg(Color::Gray),
            value_style: Style::default().fg(Color::White),

            // Status line styles
            error_style: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            help_style: Style::default().fg(Color::Gray),
            status_live: Style::default().fg(Color::Green),
            status_paused: Style::default().fg(Color::Yellow),

            // Key styles
            key_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),

            // Connection status styles
            connected_style: Style::default().fg(Color::Green),
            transitional_style: Style::default().fg(Color::Yellow),
            disconnected_style: Style::default().fg(Color::DarkGray),
            failed_style: Style::default().fg(Color::Red),

            // History styles
            user_entry_style: Style::default().fg(Color::Cyan),
            service_entry_style: Style::default().fg(Color::White),
            timestamp_style: Style::default().fg(Color::DarkGray),

            // Toast styles
            info_style: Style::default().fg(Color::Blue),
            success_style: Style::default().fg(Color::Green),
            warning_style: Style::default().fg(Color::Yellow),
        }
    }
}

impl Theme {
    pub fn status_style(&self, status: ServiceStatus) -> Style {
        match status {
            ServiceStatus::Connected => self.connected_style,
            ServiceStatus::Connecting | ServiceStatus::Disconnecting => self.transitional_style,
            ServiceStatus::Disconnected => self.disconnected_style,
            ServiceStatus::Error => self.failed_style,
        }
    }

    pub fn level_style(&self, level: Level) -> Style {
        match level {
            Level::Info => self.info_style,
            Level::Success => self.success_style,
            Level::Warning => self.warning_style,
            Level::Error => self.error_style,
        }
    }

    pub fn origin_style(&self, origin: Origin) -> Style {
        match origin {
            Origin::User => self.user_entry_style,
            Origin::Service => self.service_entry_style,
        }
    }
}
