//! Dashboard view.
//!
//! Shows one row per service with its live status, and a side panel with
//! the highlighted service's details and connection form.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap};

use crate::connection::{ConnectionRecord, ServiceId};
use crate::state::{AppState, BotField, InputMode};
use crate::ui::Theme;
use crate::ui::widgets::truncate;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Dashboard view showing every supervised service.
pub struct DashboardView;

impl DashboardView {
    /// Render the dashboard view.
    pub fn render(frame: &mut Frame, area: Rect, app_state: &AppState, theme: &Theme) {
        let direction = if area.width > 100 { Direction::Horizontal } else { Direction::Vertical };
        let chunks = Layout::default()
            .direction(direction)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        Self::render_services(frame, chunks[0], app_state, theme);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(0)])
            .split(chunks[1]);
        Self::render_details(frame, side[0], app_state, theme);
        Self::render_form(frame, side[1], app_state, theme);
    }

    fn render_services(frame: &mut Frame, area: Rect, app_state: &AppState, theme: &Theme) {
        let error_width = usize::from(area.width.saturating_sub(40));
        let rows = ServiceId::ALL.iter().filter_map(|id| app_state.record(*id)).map(|record| {
            let status = if record.status.is_transitional() {
                format!("{} {}", SPINNER[app_state.animation_frame % SPINNER.len()], record.status)
            } else {
                record.status.to_string()
            };
            let error = record.last_error.as_deref().unwrap_or("");
            Row::new(vec![
                Cell::from(record.service.label()),
                Cell::from(status).style(theme.status_style(record.status)),
                Cell::from(record.updated_at.format("%H:%M:%S").to_string()).style(theme.timestamp_style),
                Cell::from(truncate(error, error_width)).style(theme.error_style),
            ])
        });

        let header = Row::new(vec!["Service", "Status", "Updated", "Last error"])
            .style(theme.header_style)
            .bottom_margin(1);

        let table = Table::new(
            rows,
            [
                Constraint::Length(14),
                Constraint::Length(16),
                Constraint::Length(9),
                Constraint::Min(10),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Services"))
        .highlight_style(theme.selected_style)
        .highlight_symbol(">> ");

        let mut table_state = TableState::default();
        table_state.select(Some(app_state.selected % ServiceId::ALL.len()));
        frame.render_stateful_widget(table, area, &mut table_state);
    }

    fn render_details(frame: &mut Frame, area: Rect, app_state: &AppState, theme: &Theme) {
        let service = app_state.selected_service();
        let Some(record) = app_state.record(service) else {
            return;
        };

        let mut lines = vec![
            Self::field("Status", record.status.to_string(), theme.status_style(record.status), theme),
            Self::field(
                "Since",
                record.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                theme.value_style,
                theme,
            ),
        ];
        if let Some(error) = &record.last_error {
            lines.push(Self::field("Error", error.clone(), theme.error_style, theme));
        }
        lines.extend(Self::credential_lines(record, theme));

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(service.label()))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn credential_lines<'a>(record: &ConnectionRecord, theme: &Theme) -> Vec<Line<'a>> {
        let Some(serde_json::Value::Object(fields)) = &record.credentials else {
            return Vec::new();
        };
        fields
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Self::field(key, value, theme.value_style, theme)
            })
            .collect()
    }

    fn field<'a>(label: &str, value: String, style: ratatui::style::Style, theme: &Theme) -> Line<'a> {
        Line::from(vec![
            Span::styled(format!("{label}: "), theme.label_style),
            Span::styled(value, style),
        ])
    }

    fn render_form(frame: &mut Frame, area: Rect, app_state: &AppState, theme: &Theme) {
        let editing = app_state.input_mode == InputMode::Form;
        let block_style = if editing { theme.focused_block_style } else { theme.block_style };

        match app_state.selected_service() {
            ServiceId::Agent => {
                let hint = Paragraph::new(vec![
                    Line::from("The agent needs no connection details."),
                    Line::from(vec![
                        Span::styled("c", theme.key_style),
                        Span::raw(" start  "),
                        Span::styled("x", theme.key_style),
                        Span::raw(" stop"),
                    ]),
                ])
                .style(theme.help_style)
                .block(Block::default().borders(Borders::ALL).title("Connect"));
                frame.render_widget(hint, area);
            }
            ServiceId::Bot => {
                let form = &app_state.bot_form;
                let lines: Vec<Line> = BotField::ALL
                    .iter()
                    .map(|field| {
                        let focused = editing && form.focused() == *field;
                        let mut value = form.value(*field);
                        if *field == BotField::Token && !focused {
                            value = "*".repeat(value.chars().count());
                        }
                        let style = if focused {
                            theme.value_style.add_modifier(Modifier::UNDERLINED)
                        } else {
                            theme.value_style
                        };
                        Self::field(field.label(), value, style, theme)
                    })
                    .collect();
                let paragraph = Paragraph::new(lines).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(block_style)
                        .title("Bot (e edit, Tab next, Space method, Enter connect)"),
                );
                frame.render_widget(paragraph, area);
            }
            ServiceId::BrowserPool => {
                let form = &app_state.browser_form;
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Length(4), Constraint::Min(0)])
                    .split(area);

                let target = Paragraph::new(vec![
                    Self::field("API URL", form.api_url.clone(), theme.value_style, theme),
                    Self::field("Type", form.kind.display_name().to_string(), theme.value_style, theme),
                ])
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(block_style)
                        .title("Browser pool (Tab type, ^F fetch, ^S start)"),
                );
                frame.render_widget(target, chunks[0]);

                let items: Vec<ListItem> = form
                    .profiles
                    .iter()
                    .map(|profile| {
                        let mark = if form.selected.contains(&profile.id) { "[x]" } else { "[ ]" };
                        ListItem::new(format!("{mark} {} ({})", profile.name, profile.id))
                    })
                    .collect();
                let title = format!("Profiles ({} selected)", form.selected.len());
                let list = List::new(items)
                    .block(Block::default().borders(Borders::ALL).title(title))
                    .style(theme.normal_text)
                    .highlight_style(theme.selected_style)
                    .highlight_symbol(">> ");
                let mut list_state = ListState::default();
                if !form.profiles.is_empty() {
                    list_state.select(Some(form.cursor));
                }
                frame.render_stateful_widget(list, chunks[1], &mut list_state);
            }
        }
    }
}
