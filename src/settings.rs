//! Panel settings saved through the backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::PanelError;
use crate::gateway::{paths, Endpoint, Method, SharedGateway};
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub debug_mode: bool,
    pub auto_start: bool,
    pub notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            auto_start: false,
            notifications: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    DebugMode,
    AutoStart,
    Notifications,
}

impl SettingKey {
    pub const ALL: [SettingKey; 3] = [
        SettingKey::DebugMode,
        SettingKey::AutoStart,
        SettingKey::Notifications,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SettingKey::DebugMode => "Debug mode",
            SettingKey::AutoStart => "Auto start",
            SettingKey::Notifications => "Notifications",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Settings {
    pub fn get(&self, key: SettingKey) -> bool {
        match key {
            SettingKey::DebugMode => self.debug_mode,
            SettingKey::AutoStart => self.auto_start,
            SettingKey::Notifications => self.notifications,
        }
    }

    fn flip(&mut self, key: SettingKey) {
        let flag = match key {
            SettingKey::DebugMode => &mut self.debug_mode,
            SettingKey::AutoStart => &mut self.auto_start,
            SettingKey::Notifications => &mut self.notifications,
        };
        *flag = !*flag;
    }
}

pub struct SettingsStore {
    gateway: SharedGateway,
    notifier: Notifier,
    current: watch::Sender<Settings>,
}

impl SettingsStore {
    pub fn new(initial: Settings, gateway: SharedGateway, notifier: Notifier) -> Self {
        notifier.set_enabled(initial.notifications);
        let (current, _) = watch::channel(initial);
        Self {
            gateway,
            notifier,
            current,
        }
    }

    pub fn current(&self) -> Settings {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.current.subscribe()
    }

    /// Flip one flag locally and save the whole set.
    ///
    /// The local flip stands even when the save fails.
    pub async fn toggle(&self, key: SettingKey) -> Result<Settings, PanelError> {
        let mut settings = self.current();
        settings.flip(key);
        self.current.send_replace(settings);

        if key == SettingKey::Notifications {
            self.notifier.set_enabled(settings.notifications);
        }

        let body = serde_json::to_value(settings).unwrap_or(Value::Null);
        let result = self
            .gateway
            .request(Endpoint::new(paths::SETTINGS), Method::Post, Some(body))
            .await
            .into_result("Unknown error");

        match result {
            Ok(_) => {
                info!(setting = %key, value = settings.get(key), "settings saved");
                self.notifier.success("Settings saved successfully");
                Ok(settings)
            }
            Err(err) => {
                warn!(setting = %key, error = %err, "saving settings failed");
                self.notifier.error(format!("Failed to save settings: {err}"));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ApiResponse, MockGateway};
    use crate::notify::{Level, MockNotificationSink, Notification};
    use mockall::predicate::{always, eq, function};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn settings_serialize_camel_case() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(
            value,
            json!({"debugMode": false, "autoStart": false, "notifications": true})
        );
    }

    #[tokio::test]
    async fn toggle_posts_whole_settings_and_confirms() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .with(
                function(|e: &Endpoint| e.path() == paths::SETTINGS),
                eq(Method::Post),
                eq(Some(json!({"debugMode": true, "autoStart": false, "notifications": true}))),
            )
            .times(1)
            .returning(|_, _, _| ApiResponse::from(json!({"success": true})));
        let mut sink = MockNotificationSink::new();
        sink.expect_emit()
            .with(function(|n: &Notification| {
                n.level == Level::Success && n.message == "Settings saved successfully"
            }))
            .times(1)
            .return_const(());

        let store = SettingsStore::new(Settings::default(), Arc::new(gateway), Notifier::new(sink));
        let saved = store.toggle(SettingKey::DebugMode).await.unwrap();

        assert!(saved.debug_mode);
        assert_eq!(store.current(), saved);
    }

    #[tokio::test]
    async fn failed_save_keeps_local_flip_and_reports() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .returning(|_, _, _| ApiResponse::from(json!({"success": false})));
        let mut sink = MockNotificationSink::new();
        sink.expect_emit()
            .with(function(|n: &Notification| n.message == "Failed to save settings: Unknown error"))
            .times(1)
            .return_const(());

        let store = SettingsStore::new(Settings::default(), Arc::new(gateway), Notifier::new(sink));
        assert!(store.toggle(SettingKey::AutoStart).await.is_err());
        assert!(store.current().auto_start);
    }

    #[tokio::test]
    async fn disabling_notifications_silences_the_confirmation() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .with(always(), always(), always())
            .returning(|_, _, _| ApiResponse::from(json!({"success": true})));
        let mut sink = MockNotificationSink::new();
        sink.expect_emit().never();

        let notifier = Notifier::new(sink);
        let store = SettingsStore::new(Settings::default(), Arc::new(gateway), notifier.clone());
        store.toggle(SettingKey::Notifications).await.unwrap();

        assert!(!notifier.is_enabled());
    }
}
