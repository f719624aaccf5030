//! Ordering of overlapping operations on one connection machine.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{RecordingSink, ScriptedGateway};
use panel_tui::connection::{
    ConnectPayload, ConnectionMachine, RefreshMode, ServiceSpec, ServiceStatus,
};
use panel_tui::gateway::{paths, ApiResponse};
use panel_tui::notify::{Level, Notifier};
use panel_tui::PanelError;

fn agent(gateway: &Arc<ScriptedGateway>) -> (Arc<ConnectionMachine>, RecordingSink) {
    let sink = RecordingSink::default();
    let machine = ConnectionMachine::new(
        ServiceSpec::agent(),
        gateway.clone(),
        Notifier::new(sink.clone()),
    );
    (Arc::new(machine), sink)
}

/// Start a connect that blocks until `release` fires, and wait for `Connecting`.
async fn connect_in_flight(
    machine: &Arc<ConnectionMachine>,
) -> tokio::task::JoinHandle<Result<ServiceStatus, PanelError>> {
    let mut watcher = machine.subscribe();
    let handle = tokio::spawn({
        let machine = machine.clone();
        async move { machine.connect(ConnectPayload::None).await }
    });
    watcher
        .wait_for(|record| record.status == ServiceStatus::Connecting)
        .await
        .unwrap();
    handle
}

#[tokio::test]
async fn late_connect_reply_loses_to_a_newer_refresh() {
    let gateway = ScriptedGateway::new();
    let release = gateway.defer(paths::AGENT_START);
    gateway.reply(paths::AGENT_STATUS, json!({"success": true, "status": "offline"}));
    let (machine, sink) = agent(&gateway);

    let connecting = connect_in_flight(&machine).await;
    let refreshed = machine.refresh(RefreshMode::Explicit).await;
    assert!(matches!(refreshed, Ok(ServiceStatus::Disconnected)));

    release
        .send(ApiResponse::from_json(json!({"success": true})))
        .unwrap();
    let outcome = connecting.await.unwrap();

    assert!(matches!(outcome, Err(PanelError::StateConflict { seq: 1, .. })));
    assert_eq!(machine.status(), ServiceStatus::Disconnected);
    assert_eq!(machine.current_seq(), 2);
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn operations_while_connecting_are_refused_without_a_request() {
    let gateway = ScriptedGateway::new();
    let release = gateway.defer(paths::AGENT_START);
    let (machine, _sink) = agent(&gateway);

    let connecting = connect_in_flight(&machine).await;
    let seq = machine.current_seq();

    assert!(matches!(machine.disconnect().await, Err(PanelError::Busy { .. })));
    assert!(matches!(
        machine.connect(ConnectPayload::None).await,
        Err(PanelError::Busy { .. })
    ));
    assert!(matches!(
        machine.refresh(RefreshMode::Background).await,
        Err(PanelError::Busy { .. })
    ));
    assert_eq!(machine.current_seq(), seq);
    assert_eq!(gateway.count(paths::AGENT_START), 1);
    assert_eq!(gateway.count(paths::AGENT_STOP), 0);
    assert_eq!(gateway.count(paths::AGENT_STATUS), 0);

    release
        .send(ApiResponse::from_json(json!({"success": true})))
        .unwrap();
    assert!(matches!(connecting.await.unwrap(), Ok(ServiceStatus::Connected)));
    assert_eq!(machine.status(), ServiceStatus::Connected);
}

#[tokio::test]
async fn failed_disconnect_rolls_back_to_connected() {
    let gateway = ScriptedGateway::new();
    gateway.reply(paths::AGENT_START, json!({"success": true}));
    gateway.reply(
        paths::AGENT_STOP,
        json!({"success": false, "error": "agent refused to stop"}),
    );
    let (machine, sink) = agent(&gateway);

    machine.connect(ConnectPayload::None).await.unwrap();
    let outcome = machine.disconnect().await;

    assert!(matches!(outcome, Err(PanelError::Backend(_))));
    let record = machine.record();
    assert_eq!(record.status, ServiceStatus::Connected);
    assert_eq!(record.last_error.as_deref(), Some("agent refused to stop"));
    assert_eq!(
        sink.messages(),
        vec![
            (Level::Success, "Agent connected successfully".to_string()),
            (
                Level::Error,
                "Failed to disconnect agent: agent refused to stop".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn network_failure_during_connect_is_retryable() {
    let gateway = ScriptedGateway::new();
    let (machine, _sink) = agent(&gateway);

    // Nothing scripted: the first attempt sees a transport failure.
    let first = machine.connect(ConnectPayload::None).await;
    assert!(matches!(first, Err(PanelError::Transport)));
    assert_eq!(machine.status(), ServiceStatus::Disconnected);
    assert_eq!(machine.record().last_error.as_deref(), Some("network error"));

    gateway.reply(paths::AGENT_START, json!({"success": true}));
    let second = machine.connect(ConnectPayload::None).await;
    assert!(matches!(second, Ok(ServiceStatus::Connected)));
    assert_eq!(machine.record().last_error, None);
}

#[tokio::test]
async fn background_refresh_after_settling_reconciles_with_backend() {
    let gateway = ScriptedGateway::new();
    gateway.reply(paths::AGENT_START, json!({"success": true}));
    gateway.reply(paths::AGENT_STATUS, json!({"success": true, "status": "offline"}));
    let (machine, sink) = agent(&gateway);

    machine.connect(ConnectPayload::None).await.unwrap();
    let refreshed = machine.refresh(RefreshMode::Background).await;

    assert!(matches!(refreshed, Ok(ServiceStatus::Disconnected)));
    assert_eq!(machine.status(), ServiceStatus::Disconnected);
    assert_eq!(sink.messages().len(), 1);
}

#[tokio::test]
async fn failed_refresh_that_overtakes_a_connect_settles_the_machine() {
    let gateway = ScriptedGateway::new();
    let release = gateway.defer(paths::AGENT_START);
    let (machine, _sink) = agent(&gateway);

    let connecting = connect_in_flight(&machine).await;
    // No status reply scripted: the refresh sees a transport failure.
    let refreshed = machine.refresh(RefreshMode::Explicit).await;
    assert!(matches!(refreshed, Err(PanelError::Transport)));
    assert_eq!(machine.status(), ServiceStatus::Disconnected);
    assert_eq!(machine.record().last_error.as_deref(), Some("network error"));

    release
        .send(ApiResponse::from_json(json!({"success": true})))
        .unwrap();
    assert!(matches!(
        connecting.await.unwrap(),
        Err(PanelError::StateConflict { seq: 1, .. })
    ));
    assert_eq!(machine.status(), ServiceStatus::Disconnected);

    gateway.reply(paths::AGENT_START, json!({"success": true}));
    assert!(matches!(
        machine.connect(ConnectPayload::None).await,
        Ok(ServiceStatus::Connected)
    ));
}

#[tokio::test]
async fn failed_refresh_that_overtakes_a_disconnect_restores_connected() {
    let gateway = ScriptedGateway::new();
    gateway.reply(paths::AGENT_START, json!({"success": true}));
    let release = gateway.defer(paths::AGENT_STOP);
    let (machine, _sink) = agent(&gateway);
    machine.connect(ConnectPayload::None).await.unwrap();

    let mut watcher = machine.subscribe();
    let disconnecting = tokio::spawn({
        let machine = machine.clone();
        async move { machine.disconnect().await }
    });
    watcher
        .wait_for(|record| record.status == ServiceStatus::Disconnecting)
        .await
        .unwrap();

    let refreshed = machine.refresh(RefreshMode::Explicit).await;
    assert!(matches!(refreshed, Err(PanelError::Transport)));
    assert_eq!(machine.status(), ServiceStatus::Connected);

    release
        .send(ApiResponse::from_json(json!({"success": true})))
        .unwrap();
    assert!(matches!(
        disconnecting.await.unwrap(),
        Err(PanelError::StateConflict { .. })
    ));
    assert_eq!(machine.status(), ServiceStatus::Connected);
    assert!(matches!(
        machine.refresh(RefreshMode::Background).await,
        Err(PanelError::Transport)
    ));
}
