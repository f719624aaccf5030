//! Settings view.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::event::{Action, KeyMap};
use crate::settings::SettingKey;
use crate::state::AppState;
use crate::ui::Theme;

pub struct SettingsView;

impl SettingsView {
    pub fn render(frame: &mut Frame, area: Rect, app_state: &AppState, keymap: &KeyMap, theme: &Theme) {
        let lines: Vec<Line> = SettingKey::ALL
            .iter()
            .map(|key| {
                let enabled = app_state.settings.get(*key);
                let (mark, style) = if enabled {
                    ("on ", theme.connected_style)
                } else {
                    ("off", theme.disconnected_style)
                };
                let shortcut = keymap
                    .keys_for(Action::ToggleSetting(*key))
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                Line::from(vec![
                    Span::styled(format!("[{shortcut}] "), theme.key_style),
                    Span::styled(format!("{:<16}", key.label()), theme.label_style),
                    Span::styled(mark, style),
                ])
            })
            .collect();

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Settings"))
            .style(theme.normal_text);
        frame.render_widget(paragraph, area);
    }
}
