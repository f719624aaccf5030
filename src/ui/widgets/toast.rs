//! Toast stack widget.
//!
//! Draws the live notifications in the top-right corner, newest first.

use std::collections::VecDeque;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

use super::truncate;
use crate::state::Toast;
use crate::ui::Theme;

/// Height of one toast including its border.
const TOAST_HEIGHT: u16 = 3;
/// Preferred toast width including its border.
const TOAST_WIDTH: u16 = 48;

pub struct ToastStack<'a> {
    toasts: &'a VecDeque<Toast>,
    theme: &'a Theme,
}

impl<'a> ToastStack<'a> {
    pub fn new(toasts: &'a VecDeque<Toast>, theme: &'a Theme) -> Self {
        Self { toasts, theme }
    }
}

impl Widget for ToastStack<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let width = TOAST_WIDTH.min(area.width);
        if width < 5 {
            return;
        }
        let x = area.x + area.width - width;

        for (slot, toast) in self.toasts.iter().rev().enumerate() {
            let y = area.y + 1 + slot as u16 * TOAST_HEIGHT;
            if y + TOAST_HEIGHT > area.y + area.height {
                break;
            }
            let rect = Rect::new(x, y, width, TOAST_HEIGHT);
            let style = self.theme.level_style(toast.notification.level);
            let text = truncate(&toast.notification.message, usize::from(width - 2));

            Clear.render(rect, buf);
            Paragraph::new(Line::from(Span::styled(text, style)))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(style)
                        .title(toast.notification.level.to_string()),
                )
                .render(rect, buf);
        }
    }
}
