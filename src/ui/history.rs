//! Command history view.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use crate::history::Origin;
use crate::state::{AppState, InputMode};
use crate::ui::Theme;

/// View for the exchange log and the command line.
pub struct HistoryView;

impl HistoryView {
    /// Render the history view
    pub fn render(frame: &mut Frame, area: Rect, app_state: &AppState, theme: &Theme) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(area);

        // Newest entries stay visible: keep only what fits, from the end.
        let visible = usize::from(chunks[0].height.saturating_sub(2));
        let skip = app_state.history.len().saturating_sub(visible);
        let items: Vec<ListItem> = app_state
            .history
            .iter()
            .skip(skip)
            .map(|entry| {
                let who = match entry.origin {
                    Origin::User => "you",
                    Origin::Service => "agent",
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        entry.timestamp.format("%H:%M ").to_string(),
                        theme.timestamp_style,
                    ),
                    Span::styled(format!("{who:>5}: "), theme.label_style),
                    Span::styled(entry.text.clone(), theme.origin_style(entry.origin)),
                ]))
            })
            .collect();

        let title = format!("History ({} entries)", app_state.history.len());
        let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(list, chunks[0]);

        let typing = app_state.input_mode == InputMode::Command;
        let (text, style) = if typing {
            (format!("> {}_", app_state.command_input), theme.normal_text)
        } else {
            ("Press i to type a command".to_string(), theme.help_style)
        };
        let block_style = if typing { theme.focused_block_style } else { theme.block_style };
        let input = Paragraph::new(text).style(style).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(block_style)
                .title("Command"),
        );
        frame.render_widget(input, chunks[1]);
    }
}
