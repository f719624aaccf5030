//! Help overlay showing keyboard shortcuts.

use itertools::Itertools;
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::event::{Action, KeyMap};
use crate::settings::SettingKey;
use crate::ui::Theme;

/// Help overlay showing keyboard shortcuts and usage information.
pub struct HelpView;

const ENTRIES: [(Action, &str); 20] = [
    (Action::Quit, "Quit"),
    (Action::ToggleHelp, "Toggle this help screen"),
    (Action::TogglePolling, "Start or stop background polling"),
    (Action::ShowDashboard, "Dashboard"),
    (Action::ShowHistory, "Command history"),
    (Action::ShowSettings, "Settings"),
    (Action::NextItem, "Next service"),
    (Action::PrevItem, "Previous service"),
    (Action::Connect, "Connect selected service"),
    (Action::Disconnect, "Disconnect selected service"),
    (Action::Refresh, "Refresh selected service"),
    (Action::RefreshAll, "Refresh everything"),
    (Action::EditForm, "Edit connection details"),
    (Action::FocusCommand, "Type a command"),
    (Action::ClearHistory, "Clear local history"),
    (Action::ToggleSetting(SettingKey::Notifications), "Toggle notifications"),
    (Action::ToggleSetting(SettingKey::AutoStart), "Toggle auto start"),
    (Action::ToggleSetting(SettingKey::DebugMode), "Toggle debug mode"),
    (Action::FetchProfiles, "Fetch browser profiles"),
    (Action::StartProfiles, "Start selected profiles"),
];

impl HelpView {
    /// Render the help overlay
    pub fn render(frame: &mut Frame, area: Rect, keymap: &KeyMap, theme: &Theme) {
        let popup_area = Self::centered_rect(60, 80, area);
        frame.render_widget(Clear, popup_area);

        let mut help_text = vec![
            Line::from(Span::styled("Shortcuts", Style::default().add_modifier(Modifier::BOLD))),
            Line::from(""),
        ];
        help_text.extend(ENTRIES.iter().map(|(action, description)| {
            let keys = keymap.keys_for(*action).iter().join(", ");
            Line::from(vec![
                Span::styled(format!("{keys:>12}"), theme.key_style),
                Span::raw(format!(" - {description}")),
            ])
        }));
        help_text.push(Line::from(""));
        help_text.push(Line::from(Span::styled(
            "In a form or the command line, Esc returns to normal keys.",
            theme.help_style,
        )));

        let help_widget = Paragraph::new(help_text)
            .block(
                Block::default()
                    .title("Panel Help")
                    .borders(Borders::ALL)
                    .style(theme.block_style),
            )
            .style(theme.normal_text)
            .alignment(Alignment::Left);

        frame.render_widget(help_widget, popup_area);
    }

    /// Helper function to create a centered rect using percentages
    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_width = r.width * percent_x / 100;
        let popup_height = r.height * percent_y / 100;

        Rect {
            x: r.x + (r.width - popup_width) / 2,
            y: r.y + (r.height - popup_height) / 2,
            width: popup_width,
            height: popup_height,
        }
    }
}
