//! Key bindings.
//!
//! Every normal-mode key the panel understands is listed once, in
//! [`KeyMap::standard`]. Binding the same key twice is an error, so two
//! actions can never silently compete for one key.

use std::collections::HashMap;
use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::error::PanelError;
use crate::settings::SettingKey;

/// Everything a key can ask the app to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleHelp,
    /// Start or stop background polling.
    TogglePolling,
    ShowDashboard,
    ShowHistory,
    ShowSettings,
    NextItem,
    PrevItem,
    /// Connect the highlighted service.
    Connect,
    /// Disconnect the highlighted service.
    Disconnect,
    /// Re-read the highlighted service's status.
    Refresh,
    /// Re-read every service and the history.
    RefreshAll,
    /// Open the highlighted service's connection form.
    EditForm,
    /// Start typing a command.
    FocusCommand,
    ClearHistory,
    ToggleSetting(SettingKey),
    FetchProfiles,
    StartProfiles,
}

/// A key plus the modifiers that matter for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        // The case of a character already carries Shift.
        let modifiers = match code {
            KeyCode::Char(_) => modifiers - KeyModifiers::SHIFT,
            _ => modifiers,
        };
        Self { code, modifiers }
    }

    pub fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}

impl From<&KeyEvent> for KeyBinding {
    fn from(key: &KeyEvent) -> Self {
        Self::new(key.code, key.modifiers)
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            write!(f, "Ctrl-")?;
        }
        match self.code {
            KeyCode::Char(' ') => write!(f, "Space"),
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::F(n) => write!(f, "F{n}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Dispatch table from keys to actions.
#[derive(Debug, Default, Clone)]
pub struct KeyMap {
    bindings: HashMap<KeyBinding, Action>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding, refusing keys that are already taken.
    pub fn bind(&mut self, key: KeyBinding, action: Action) -> Result<(), PanelError> {
        if let Some(existing) = self.bindings.get(&key) {
            return Err(PanelError::DuplicateBinding(format!(
                "{key} (bound to {existing:?}, requested for {action:?})"
            )));
        }
        self.bindings.insert(key, action);
        Ok(())
    }

    pub fn resolve(&self, key: &KeyEvent) -> Option<Action> {
        self.bindings.get(&KeyBinding::from(key)).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The panel's bindings.
    pub fn standard() -> Result<Self, PanelError> {
        use Action::*;

        let mut map = Self::new();
        let plain = |c: char| KeyBinding::plain(KeyCode::Char(c));
        let table = [
            (plain('q'), Quit),
            (KeyBinding::ctrl('c'), Quit),
            (plain('?'), ToggleHelp),
            (KeyBinding::plain(KeyCode::F(1)), ToggleHelp),
            (plain('p'), TogglePolling),
            (plain('d'), ShowDashboard),
            (plain('h'), ShowHistory),
            (plain('s'), ShowSettings),
            (plain('j'), NextItem),
            (KeyBinding::plain(KeyCode::Down), NextItem),
            (plain('k'), PrevItem),
            (KeyBinding::plain(KeyCode::Up), PrevItem),
            (plain('c'), Connect),
            (plain('x'), Disconnect),
            (plain('r'), Refresh),
            (plain('R'), RefreshAll),
            (plain('e'), EditForm),
            (KeyBinding::plain(KeyCode::Enter), EditForm),
            (plain('i'), FocusCommand),
            (plain(':'), FocusCommand),
            (plain('C'), ClearHistory),
            (plain('D'), ToggleSetting(SettingKey::DebugMode)),
            (plain('A'), ToggleSetting(SettingKey::AutoStart)),
            (plain('N'), ToggleSetting(SettingKey::Notifications)),
            (plain('f'), FetchProfiles),
            (plain('S'), StartProfiles),
        ];
        for (key, action) in table {
            map.bind(key, action)?;
        }
        Ok(map)
    }

    /// Keys bound to `action`, for the help screen.
    pub fn keys_for(&self, action: Action) -> Vec<KeyBinding> {
        let mut keys: Vec<KeyBinding> = self
            .bindings
            .iter()
            .filter(|(_, bound)| **bound == action)
            .map(|(key, _)| *key)
            .collect();
        keys.sort_by_key(|key| key.to_string());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn standard_map_has_no_conflicts() {
        let map = KeyMap::standard().unwrap();
        assert!(!map.is_empty());
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let mut map = KeyMap::new();
        map.bind(KeyBinding::plain(KeyCode::Char('c')), Action::Connect)
            .unwrap();

        let err = map
            .bind(KeyBinding::plain(KeyCode::Char('c')), Action::ClearHistory)
            .unwrap_err();

        assert!(matches!(err, PanelError::DuplicateBinding(_)));
        assert_eq!(
            map.resolve(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)),
            Some(Action::Connect)
        );
    }

    #[test]
    fn shifted_letters_resolve_without_shift_modifier() {
        let map = KeyMap::standard().unwrap();
        let shifted = KeyEvent::new(KeyCode::Char('R'), KeyModifiers::SHIFT);
        assert_eq!(map.resolve(&shifted), Some(Action::RefreshAll));
    }

    #[test]
    fn control_is_significant() {
        let map = KeyMap::standard().unwrap();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map.resolve(&ctrl_c), Some(Action::Quit));
        let ctrl_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL);
        assert_eq!(map.resolve(&ctrl_x), None);
    }

    #[test]
    fn help_lists_every_key_of_an_action() {
        let map = KeyMap::standard().unwrap();
        let keys: Vec<String> = map
            .keys_for(Action::Quit)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(keys, vec!["Ctrl-c", "q"]);
    }
}
