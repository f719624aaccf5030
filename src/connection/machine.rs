//! The generic connection state machine.
//!
//! Transitions are optimistic: the transitional status is written before the
//! request goes out, and the prior terminal status is restored when the
//! request fails. Every operation takes a sequence number; a response whose
//! number is no longer the latest one issued for this machine is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::service::{credentials_from, ServiceSpec};
use super::{ConnectPayload, ConnectionRecord, RefreshMode, ServiceId, ServiceStatus};
use crate::error::PanelError;
use crate::gateway::{ApiResponse, SharedGateway};
use crate::monitor::Refresh;
use crate::notify::Notifier;

pub struct ConnectionMachine {
    spec: ServiceSpec,
    gateway: SharedGateway,
    notifier: Notifier,
    record: watch::Sender<ConnectionRecord>,
    seq: AtomicU64,
    /// Terminal status the pending transition falls back to
    rollback: Mutex<ServiceStatus>,
}

impl ConnectionMachine {
    pub fn new(spec: ServiceSpec, gateway: SharedGateway, notifier: Notifier) -> Self {
        let (record, _) = watch::channel(ConnectionRecord::new(spec.id));
        Self {
            spec,
            gateway,
            notifier,
            record,
            seq: AtomicU64::new(0),
            rollback: Mutex::new(ServiceStatus::Disconnected),
        }
    }

    pub fn id(&self) -> ServiceId {
        self.spec.id
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    pub fn status(&self) -> ServiceStatus {
        self.record.borrow().status
    }

    /// Snapshot of the current record.
    pub fn record(&self) -> ConnectionRecord {
        self.record.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionRecord> {
        self.record.subscribe()
    }

    /// Sequence number of the most recently issued operation.
    pub fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// `Disconnected | Error --connect--> Connecting --> Connected | Disconnected`.
    pub async fn connect(&self, payload: ConnectPayload) -> Result<ServiceStatus, PanelError> {
        let service = self.id();
        match self.status() {
            status @ (ServiceStatus::Connecting | ServiceStatus::Disconnecting) => {
                debug!(%service, %status, "connect ignored, operation in flight");
                return Err(PanelError::Busy { service, status });
            }
            status @ ServiceStatus::Connected => {
                debug!(%service, "connect ignored, already connected");
                return Err(PanelError::InvalidTransition {
                    service,
                    status,
                    action: "connect",
                });
            }
            ServiceStatus::Disconnected | ServiceStatus::Error => {}
        }

        let body = match self.spec.validate(&payload) {
            Ok(body) => body,
            Err(err) => {
                self.notifier.error(err.to_string());
                return Err(err);
            }
        };

        let seq = self.begin(ServiceStatus::Connecting, ServiceStatus::Disconnected);
        info!(%service, seq, "connecting");

        let route = self.spec.connect;
        let response = self.gateway.request(route.endpoint(), route.method, body).await;
        self.ensure_latest(seq)?;

        match response.into_result("Connection failed") {
            Ok(response) => {
                let credentials = credentials_from(&response);
                self.apply(ServiceStatus::Connected, |record| {
                    record.last_error = None;
                    record.credentials = credentials;
                });
                info!(%service, seq, "connected");
                self.notifier
                    .success(format!("{} connected successfully", service.label()));
                Ok(ServiceStatus::Connected)
            }
            Err(err) => {
                self.fail("connect", seq, ServiceStatus::Disconnected, &err);
                self.notifier
                    .error(format!("Failed to connect {service}: {err}"));
                Err(err)
            }
        }
    }

    /// `Connected --disconnect--> Disconnecting --> Disconnected | Connected`.
    pub async fn disconnect(&self) -> Result<ServiceStatus, PanelError> {
        let service = self.id();
        match self.status() {
            status @ (ServiceStatus::Connecting | ServiceStatus::Disconnecting) => {
                debug!(%service, %status, "disconnect ignored, operation in flight");
                return Err(PanelError::Busy { service, status });
            }
            ServiceStatus::Connected => {}
            status => {
                debug!(%service, %status, "disconnect ignored, not connected");
                return Err(PanelError::InvalidTransition {
                    service,
                    status,
                    action: "disconnect",
                });
            }
        }

        let seq = self.begin(ServiceStatus::Disconnecting, ServiceStatus::Connected);
        info!(%service, seq, "disconnecting");

        let route = self.spec.disconnect;
        let response = self.gateway.request(route.endpoint(), route.method, None).await;
        self.ensure_latest(seq)?;

        match response.into_result("Disconnect failed") {
            Ok(_) => {
                self.apply(ServiceStatus::Disconnected, |record| {
                    record.last_error = None;
                    record.credentials = None;
                });
                info!(%service, seq, "disconnected");
                self.notifier.success(format!("{} disconnected", service.label()));
                Ok(ServiceStatus::Disconnected)
            }
            Err(err) => {
                self.fail("disconnect", seq, ServiceStatus::Connected, &err);
                self.notifier
                    .error(format!("Failed to disconnect {service}: {err}"));
                Err(err)
            }
        }
    }

    /// Reconcile with the backend's reported status.
    ///
    /// Goes straight to the confirmed terminal status without passing through
    /// a transitional one. A transport failure leaves the status untouched.
    pub async fn refresh(&self, mode: RefreshMode) -> Result<ServiceStatus, PanelError> {
        let service = self.id();
        if mode == RefreshMode::Background {
            let status = self.status();
            if status.is_transitional() {
                return Err(PanelError::Busy { service, status });
            }
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let route = self.spec.status;
        let response = self.gateway.request(route.endpoint(), route.method, None).await;
        self.ensure_latest(seq)?;

        let outcome = self.reconcile(&response);
        match &outcome {
            Ok(status) => debug!(%service, seq, %status, "refreshed"),
            Err(err) => {
                debug!(%service, seq, error = %err, "refresh failed");
                if mode == RefreshMode::Explicit {
                    self.notifier
                        .error(format!("Failed to refresh {service}: {err}"));
                }
            }
        }
        outcome
    }

    fn reconcile(&self, response: &ApiResponse) -> Result<ServiceStatus, PanelError> {
        if response.is_transport_failure() {
            // This refresh superseded the pending transition, so nothing else
            // will settle it.
            let status = self.status();
            if status.is_transitional() {
                let terminal = self.rollback_target();
                let service = self.id();
                warn!(%service, %status, "refresh failed mid-transition, rolling back to {terminal}");
                let message = PanelError::Transport.to_string();
                self.apply(terminal, |record| record.last_error = Some(message));
            }
            return Err(PanelError::Transport);
        }
        if !response.is_object() {
            let err = PanelError::UnexpectedResponse(format!(
                "expected a JSON object, got {}",
                response.body()
            ));
            self.fault(&err);
            return Err(err);
        }

        match self.spec.read_status(response) {
            Ok(true) => {
                let credentials = credentials_from(response);
                self.apply(ServiceStatus::Connected, |record| {
                    record.last_error = None;
                    if credentials.is_some() {
                        record.credentials = credentials;
                    }
                });
                Ok(ServiceStatus::Connected)
            }
            Ok(false) => {
                self.apply(ServiceStatus::Disconnected, |record| {
                    record.last_error = None;
                    record.credentials = None;
                });
                Ok(ServiceStatus::Disconnected)
            }
            Err(PanelError::Backend(message)) => {
                self.apply(ServiceStatus::Disconnected, |record| {
                    record.last_error = Some(message.clone());
                    record.credentials = None;
                });
                Err(PanelError::Backend(message))
            }
            Err(err) => {
                self.fault(&err);
                Err(err)
            }
        }
    }

    /// Issue a sequence number and write the optimistic status.
    fn begin(&self, transitional: ServiceStatus, rollback: ServiceStatus) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        *self.rollback.lock().unwrap_or_else(PoisonError::into_inner) = rollback;
        self.apply(transitional, |record| record.last_error = None);
        seq
    }

    fn rollback_target(&self) -> ServiceStatus {
        *self.rollback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_latest(&self, seq: u64) -> Result<(), PanelError> {
        let latest = self.current_seq();
        if seq == latest {
            return Ok(());
        }
        let service = self.id();
        debug!(%service, seq, latest, "discarding stale response");
        Err(PanelError::StateConflict { service, seq })
    }

    /// Roll back to `terminal` after a failed transition. Unexpected
    /// responses land in `Error` instead.
    fn fail(&self, action: &str, seq: u64, terminal: ServiceStatus, err: &PanelError) {
        let service = self.id();
        if let PanelError::UnexpectedResponse(_) = err {
            warn!(%service, seq, action, error = %err, "unexpected response");
            self.fault(err);
            return;
        }
        warn!(%service, seq, action, error = %err, "rolling back to {terminal}");
        let message = err.to_string();
        self.apply(terminal, |record| record.last_error = Some(message));
    }

    fn fault(&self, err: &PanelError) {
        let message = err.to_string();
        self.apply(ServiceStatus::Error, |record| record.last_error = Some(message));
    }

    /// Write a status; watchers are only woken when something changed.
    fn apply(&self, status: ServiceStatus, update: impl FnOnce(&mut ConnectionRecord)) {
        self.record.send_if_modified(|record| {
            let before = record.clone();
            record.status = status;
            update(record);
            if *record == before {
                return false;
            }
            record.updated_at = Utc::now();
            true
        });
    }
}

#[async_trait]
impl Refresh for ConnectionMachine {
    fn name(&self) -> String {
        self.id().to_string()
    }

    async fn refresh_in_background(&self) {
        // Failures are swallowed; the record already reflects them.
        let _ = self.refresh(RefreshMode::Background).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{BotLink, UpdateMethod};
    use crate::gateway::{Method, MockGateway};
    use crate::notify::{Level, MockNotificationSink, Notification};
    use mockall::predicate::{always, eq, function};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn machine(spec: ServiceSpec, gateway: MockGateway, sink: MockNotificationSink) -> ConnectionMachine {
        ConnectionMachine::new(spec, Arc::new(gateway), Notifier::new(sink))
    }

    fn silent_sink() -> MockNotificationSink {
        let mut sink = MockNotificationSink::new();
        sink.expect_emit().return_const(());
        sink
    }

    fn bot_link(token: &str, chat: &str) -> ConnectPayload {
        ConnectPayload::Bot(BotLink {
            bot_token: token.into(),
            chat_id: chat.into(),
            webhook_url: None,
            update_method: UpdateMethod::Polling,
        })
    }

    #[test]
    fn starts_disconnected() {
        let m = machine(ServiceSpec::agent(), MockGateway::new(), MockNotificationSink::new());
        let record = m.record();
        assert_eq!(record.status, ServiceStatus::Disconnected);
        assert_eq!(record.last_error, None);
        assert_eq!(record.credentials, None);
        assert_eq!(m.current_seq(), 0);
    }

    #[tokio::test]
    async fn valid_bot_connect_notifies_success_once() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .with(
                function(|e: &crate::gateway::Endpoint| e.path() == "/api/telegram/connect"),
                eq(Method::Post),
                eq(Some(json!({
                    "bot_token": "abc",
                    "chat_id": "123",
                    "webhook_url": null,
                    "update_method": "polling",
                }))),
            )
            .times(1)
            .returning(|_, _, _| ApiResponse::from(json!({"success": true, "user_id": "u1"})));

        let mut sink = MockNotificationSink::new();
        sink.expect_emit()
            .with(function(|n: &Notification| {
                n.level == Level::Success && n.message.contains("connected successfully")
            }))
            .times(1)
            .return_const(());

        let m = machine(ServiceSpec::bot(), gateway, sink);
        let status = m.connect(bot_link("abc", "123")).await;

        assert_eq!(status, Ok(ServiceStatus::Connected));
        let record = m.record();
        assert_eq!(record.status, ServiceStatus::Connected);
        assert_eq!(record.credentials, Some(json!({"user_id": "u1"})));
    }

    #[tokio::test]
    async fn validation_failure_sends_nothing_and_changes_nothing() {
        let mut gateway = MockGateway::new();
        gateway.expect_request().never();

        let mut sink = MockNotificationSink::new();
        sink.expect_emit()
            .with(function(|n: &Notification| {
                n.level == Level::Error && n.message == "Please fill all required fields"
            }))
            .times(1)
            .return_const(());

        let m = machine(ServiceSpec::bot(), gateway, sink);
        let before = m.record();
        let result = m.connect(bot_link("abc", "")).await;

        assert!(matches!(result, Err(PanelError::Validation(_))));
        assert_eq!(m.record(), before);
        assert_eq!(m.current_seq(), 0);
    }

    #[tokio::test]
    async fn backend_rejection_rolls_back_to_disconnected() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .times(1)
            .returning(|_, _, _| ApiResponse::from(json!({"success": false, "error": "X"})));

        let m = machine(ServiceSpec::agent(), gateway, silent_sink());
        let result = m.connect(ConnectPayload::None).await;

        assert_eq!(result, Err(PanelError::Backend("X".into())));
        let record = m.record();
        assert_eq!(record.status, ServiceStatus::Disconnected);
        assert_eq!(record.last_error.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_generic_message() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .returning(|_, _, _| ApiResponse::network_error());

        let mut sink = MockNotificationSink::new();
        sink.expect_emit()
            .with(function(|n: &Notification| n.message == "Failed to connect agent: network error"))
            .times(1)
            .return_const(());

        let m = machine(ServiceSpec::agent(), gateway, sink);
        assert_eq!(m.connect(ConnectPayload::None).await, Err(PanelError::Transport));
        assert_eq!(m.status(), ServiceStatus::Disconnected);
        assert_eq!(m.record().last_error.as_deref(), Some("network error"));
    }

    #[tokio::test]
    async fn failed_disconnect_rolls_back_to_connected() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .with(
                function(|e: &crate::gateway::Endpoint| e.path() == "/api/agent/start"),
                always(),
                always(),
            )
            .returning(|_, _, _| ApiResponse::from(json!({"success": true, "pid": 12345})));
        gateway
            .expect_request()
            .with(
                function(|e: &crate::gateway::Endpoint| e.path() == "/api/agent/stop"),
                always(),
                always(),
            )
            .returning(|_, _, _| ApiResponse::from(json!({"success": false, "error": "Agent not running"})));

        let m = machine(ServiceSpec::agent(), gateway, silent_sink());
        m.connect(ConnectPayload::None).await.unwrap();

        let result = m.disconnect().await;

        assert_eq!(result, Err(PanelError::Backend("Agent not running".into())));
        assert_eq!(m.status(), ServiceStatus::Connected);
        assert_eq!(m.record().credentials, Some(json!({"pid": 12345})));
    }

    #[tokio::test]
    async fn disconnect_while_disconnected_is_rejected() {
        let mut gateway = MockGateway::new();
        gateway.expect_request().never();

        let m = machine(ServiceSpec::browser_pool(), gateway, MockNotificationSink::new());
        let result = m.disconnect().await;

        assert!(matches!(result, Err(PanelError::InvalidTransition { action: "disconnect", .. })));
        assert_eq!(m.current_seq(), 0);
    }

    #[tokio::test]
    async fn unexpected_connect_body_moves_to_error_and_connect_leaves_it() {
        let mut gateway = MockGateway::new();
        let mut calls = 0;
        gateway.expect_request().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                ApiResponse::from(json!("<html>"))
            } else {
                ApiResponse::from(json!({"success": true}))
            }
        });

        let m = machine(ServiceSpec::agent(), gateway, silent_sink());
        let first = m.connect(ConnectPayload::None).await;
        assert!(matches!(first, Err(PanelError::UnexpectedResponse(_))));
        assert_eq!(m.status(), ServiceStatus::Error);

        assert_eq!(m.connect(ConnectPayload::None).await, Ok(ServiceStatus::Connected));
        assert_eq!(m.record().last_error, None);
    }

    #[tokio::test]
    async fn refresh_flips_directly_to_reported_status() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .returning(|_, _, _| ApiResponse::from(json!({"success": true, "status": "connected", "user_id": "u7"})));

        let m = machine(ServiceSpec::bot(), gateway, MockNotificationSink::new());
        let mut rx = m.subscribe();

        assert_eq!(m.refresh(RefreshMode::Background).await, Ok(ServiceStatus::Connected));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, ServiceStatus::Connected);

        // Same answer again: nothing changes, watchers stay asleep.
        m.refresh(RefreshMode::Background).await.unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn background_refresh_swallows_errors_explicit_surfaces_them() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .returning(|_, _, _| ApiResponse::from(json!({"success": false, "error": "Internal server error"})));

        let mut sink = MockNotificationSink::new();
        sink.expect_emit()
            .with(function(|n: &Notification| {
                n.message == "Failed to refresh agent: Internal server error"
            }))
            .times(1)
            .return_const(());

        let m = machine(ServiceSpec::agent(), gateway, sink);

        let background = m.refresh(RefreshMode::Background).await;
        assert_eq!(background, Err(PanelError::Backend("Internal server error".into())));
        assert_eq!(m.status(), ServiceStatus::Disconnected);
        assert_eq!(m.record().last_error.as_deref(), Some("Internal server error"));

        let explicit = m.refresh(RefreshMode::Explicit).await;
        assert!(explicit.is_err());
    }

    #[tokio::test]
    async fn refresh_transport_failure_keeps_status() {
        let mut gateway = MockGateway::new();
        let mut calls = 0;
        gateway.expect_request().returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                ApiResponse::from(json!({"success": true, "status": "online"}))
            } else {
                ApiResponse::network_error()
            }
        });

        let m = machine(ServiceSpec::agent(), gateway, MockNotificationSink::new());
        m.refresh(RefreshMode::Background).await.unwrap();
        assert_eq!(m.refresh(RefreshMode::Background).await, Err(PanelError::Transport));
        assert_eq!(m.status(), ServiceStatus::Connected);
    }

    #[tokio::test]
    async fn malformed_status_moves_to_error() {
        let mut gateway = MockGateway::new();
        gateway
            .expect_request()
            .returning(|_, _, _| ApiResponse::from(json!({"success": true, "active_profiles": 3})));

        let m = machine(ServiceSpec::browser_pool(), gateway, MockNotificationSink::new());
        let result = m.refresh(RefreshMode::Background).await;

        assert!(matches!(result, Err(PanelError::UnexpectedResponse(_))));
        assert_eq!(m.status(), ServiceStatus::Error);
        assert!(m.record().last_error.is_some());
    }
}
