//! Connection forms for the services that need details.

use std::collections::BTreeSet;

use crate::connection::{BotLink, BrowserProfile, ConnectPayload, PoolKind, PoolTarget, UpdateMethod};

/// Text field currently receiving input.
pub trait Editable {
    /// Mutable access to the focused text, if the focused field is textual.
    fn focused_text(&mut self) -> Option<&mut String>;

    /// Move focus to the next field, wrapping around.
    fn next_field(&mut self);

    fn push_char(&mut self, c: char) {
        if let Some(text) = self.focused_text() {
            text.push(c);
        }
    }

    fn backspace(&mut self) {
        if let Some(text) = self.focused_text() {
            text.pop();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotField {
    Token,
    ChatId,
    WebhookUrl,
    UpdateMethod,
}

impl BotField {
    pub const ALL: [BotField; 4] = [
        BotField::Token,
        BotField::ChatId,
        BotField::WebhookUrl,
        BotField::UpdateMethod,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BotField::Token => "Bot token",
            BotField::ChatId => "Chat ID",
            BotField::WebhookUrl => "Webhook URL",
            BotField::UpdateMethod => "Updates",
        }
    }
}

/// Messaging-bot connection details as typed.
#[derive(Debug, Clone, Default)]
pub struct BotForm {
    pub token: String,
    pub chat_id: String,
    pub webhook_url: String,
    pub update_method: UpdateMethod,
    /// Index into [`BotField::ALL`]
    pub focus: usize,
}

impl BotForm {
    pub fn focused(&self) -> BotField {
        BotField::ALL[self.focus % BotField::ALL.len()]
    }

    pub fn value(&self, field: BotField) -> String {
        match field {
            BotField::Token => self.token.clone(),
            BotField::ChatId => self.chat_id.clone(),
            BotField::WebhookUrl => self.webhook_url.clone(),
            BotField::UpdateMethod => self.update_method.to_string(),
        }
    }

    pub fn toggle_update_method(&mut self) {
        self.update_method = self.update_method.toggled();
    }

    pub fn payload(&self) -> ConnectPayload {
        let webhook_url = Some(self.webhook_url.clone()).filter(|url| !url.trim().is_empty());
        ConnectPayload::Bot(BotLink {
            bot_token: self.token.clone(),
            chat_id: self.chat_id.clone(),
            webhook_url,
            update_method: self.update_method,
        })
    }
}

impl Editable for BotForm {
    fn focused_text(&mut self) -> Option<&mut String> {
        match self.focused() {
            BotField::Token => Some(&mut self.token),
            BotField::ChatId => Some(&mut self.chat_id),
            BotField::WebhookUrl => Some(&mut self.webhook_url),
            BotField::UpdateMethod => None,
        }
    }

    fn next_field(&mut self) {
        self.focus = (self.focus + 1) % BotField::ALL.len();
    }
}

/// Browser-pool connection details and the fetched profile list.
#[derive(Debug, Clone, Default)]
pub struct BrowserForm {
    pub api_url: String,
    pub kind: PoolKind,
    pub profiles: Vec<BrowserProfile>,
    /// Ids of the profiles marked for start
    pub selected: BTreeSet<String>,
    /// Highlighted row in the profile list
    pub cursor: usize,
}

impl BrowserForm {
    pub fn target(&self) -> PoolTarget {
        PoolTarget::new(self.api_url.clone(), self.kind)
    }

    pub fn payload(&self) -> ConnectPayload {
        ConnectPayload::BrowserPool(self.target())
    }

    pub fn cycle_kind(&mut self) {
        self.kind = self.kind.next();
    }

    /// Replace the profile list, keeping only selections that still exist.
    pub fn set_profiles(&mut self, profiles: Vec<BrowserProfile>) {
        self.selected
            .retain(|id| profiles.iter().any(|profile| &profile.id == id));
        self.cursor = self.cursor.min(profiles.len().saturating_sub(1));
        self.profiles = profiles;
    }

    pub fn move_cursor(&mut self, forward: bool) {
        if self.profiles.is_empty() {
            return;
        }
        let len = self.profiles.len();
        self.cursor = if forward {
            (self.cursor + 1) % len
        } else {
            (self.cursor + len - 1) % len
        };
    }

    pub fn toggle_selected(&mut self) {
        let Some(profile) = self.profiles.get(self.cursor) else {
            return;
        };
        if !self.selected.remove(&profile.id) {
            self.selected.insert(profile.id.clone());
        }
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.profiles
            .iter()
            .filter(|profile| self.selected.contains(&profile.id))
            .map(|profile| profile.id.clone())
            .collect()
    }
}

impl Editable for BrowserForm {
    fn focused_text(&mut self) -> Option<&mut String> {
        Some(&mut self.api_url)
    }

    fn next_field(&mut self) {
        self.cycle_kind();
    }
}
