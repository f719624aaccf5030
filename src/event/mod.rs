//! Event handling for the panel.
//!
//! Terminal input and periodic ticks are merged into one stream of
//! [`Event`]s by the [`EventHandler`]. Key presses are then resolved to
//! [`Action`]s through the [`KeyMap`], the single table of key bindings.

pub mod handler;
pub mod keymap;

pub use handler::EventHandler;
pub use keymap::{Action, KeyBinding, KeyMap};

use std::time::Duration;

use crossterm::event::{KeyEvent, KeyEventKind, MouseEvent};

/// Default tick interval.
pub const DEFAULT_TICK_RATE: Duration = Duration::from_millis(250);

/// Application events
#[derive(Debug, Clone)]
pub enum Event {
    /// Keyboard input event
    Key(KeyEvent),
    /// Mouse input event
    Mouse(MouseEvent),
    /// Terminal resize event
    Resize(u16, u16),
    /// Regular tick event for animations and toast expiry
    Tick,
}

impl Event {
    /// Whether this event counts as the user being present.
    pub fn is_user_activity(&self) -> bool {
        match self {
            Event::Key(key) => key.kind != KeyEventKind::Release,
            Event::Mouse(_) => true,
            Event::Resize(..) | Event::Tick => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEventKind};
    use rstest::rstest;

    fn mouse(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[rstest]
    #[case(Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)), true)]
    #[case(mouse(MouseEventKind::ScrollDown), true)]
    #[case(mouse(MouseEventKind::Moved), true)]
    #[case(mouse(MouseEventKind::Down(MouseButton::Left)), true)]
    #[case(Event::Resize(80, 24), false)]
    #[case(Event::Tick, false)]
    fn activity_classification(#[case] event: Event, #[case] expected: bool) {
        assert_eq!(event.is_user_activity(), expected);
    }
}
