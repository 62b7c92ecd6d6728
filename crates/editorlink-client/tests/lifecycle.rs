//! Connection lifecycle against an in-process editor.

mod support;

use editorlink_client::{BridgeClient, BridgeError, ConnectionState, LogLevel, PlayModeState};
use editorlink_core::{BridgeMessage, Category, CommandResponse};
use serde_json::json;
use std::time::Duration;
use support::{FakeEditor, echo, fast_config, next_state, silent, wait_for_state};

use ConnectionState::{Connected, Connecting, Disconnected, Reconnecting};

#[tokio::test]
async fn discovers_connects_and_round_trips_a_command() {
    let root = tempfile::tempdir().unwrap();
    let editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();

    client.connect();
    assert_eq!(next_state(&mut states).await, Connecting);
    assert_eq!(next_state(&mut states).await, Connected);

    let response = client
        .send_command(Category::GameObject, "create", json!({"name": "Player"}))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.result, Some(json!({"name": "Player"})));
    assert_eq!(editor.requests(), vec!["gameObject.create"]);
    assert_eq!(client.pending_requests(), 0);

    client.shutdown().await;
}

#[tokio::test]
async fn send_before_connect_fails_immediately() {
    let root = tempfile::tempdir().unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let err = client
        .send_command(Category::Scene, "save", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err, BridgeError::NotConnected);
}

#[tokio::test]
async fn no_descriptor_stays_disconnected() {
    let root = tempfile::tempdir().unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();

    client.connect();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(client.state(), Disconnected);
    assert!(states.try_recv().is_err());
    client.shutdown().await;
}

#[tokio::test]
async fn refused_first_handshake_falls_back_to_polling() {
    let root = tempfile::tempdir().unwrap();
    let dead = support::closed_port().await.unwrap();
    support::write_descriptor(root.path(), dead).unwrap();
    let mut config = fast_config();
    config.poll_interval = Duration::from_millis(300);
    let client = BridgeClient::new(root.path(), config);
    let mut states = client.subscribe_state();

    client.connect();
    assert_eq!(next_state(&mut states).await, Connecting);
    assert_eq!(next_state(&mut states).await, Disconnected);

    // Without a descriptor nothing is attempted.
    support::remove_descriptor(root.path());
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(states.try_recv().is_err());
    assert_eq!(client.state(), Disconnected);

    let editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    assert_eq!(next_state(&mut states).await, Connecting);
    assert_eq!(next_state(&mut states).await, Connected);
    assert_eq!(editor.accepted(), 1);
    client.shutdown().await;
}

#[tokio::test]
async fn version_mismatch_still_connects() {
    let root = tempfile::tempdir().unwrap();
    let editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    support::write_descriptor_with_version(root.path(), editor.port(), "0.9.0").unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();

    client.connect();
    assert_eq!(next_state(&mut states).await, Connecting);
    assert_eq!(next_state(&mut states).await, Connected);
    let response = client
        .send_command(Category::Scene, "save", json!({}))
        .await
        .unwrap();
    assert!(response.success);
    client.shutdown().await;
}

#[tokio::test]
async fn editor_side_failure_is_data_not_error() {
    let root = tempfile::tempdir().unwrap();
    let _editor = FakeEditor::start(
        root.path(),
        support::handler(|_, _| Some(CommandResponse::failure("GameObject not found: Ghost"))),
    )
    .await
    .unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    let response = client
        .send_command(Category::GameObject, "delete", json!({"name": "Ghost"}))
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.error_text(), "GameObject not found: Ghost");
    client.shutdown().await;
}

#[tokio::test]
async fn unanswered_command_times_out_with_its_name() {
    let root = tempfile::tempdir().unwrap();
    let _editor = FakeEditor::start(root.path(), silent()).await.unwrap();
    let mut config = fast_config();
    config.command_timeout = Duration::from_millis(150);
    let client = BridgeClient::new(root.path(), config);
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    let err = client
        .send_command(Category::Scene, "save", json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BridgeError::CommandTimeout {
            command: "scene.save".into()
        }
    );
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(client.state(), Connected);
    client.shutdown().await;
}

#[tokio::test]
async fn concurrent_commands_resolve_independently() {
    let root = tempfile::tempdir().unwrap();
    let _editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    let (a, b) = tokio::join!(
        client.send_command(Category::Asset, "find", json!({"n": 1})),
        client.send_command(Category::Asset, "find", json!({"n": 2})),
    );
    assert_eq!(a.unwrap().result, Some(json!({"n": 1})));
    assert_eq!(b.unwrap().result, Some(json!({"n": 2})));
    client.shutdown().await;
}

#[tokio::test]
async fn unmatched_response_is_ignored() {
    let root = tempfile::tempdir().unwrap();
    let editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    editor.push(BridgeMessage::response("not-ours", CommandResponse::ok(json!(1))));
    let response = client
        .send_command(Category::Project, "info", json!({}))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(client.state(), Connected);
    client.shutdown().await;
}

#[tokio::test]
async fn pushed_events_reach_subscribers() {
    let root = tempfile::tempdir().unwrap();
    let editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();
    let mut logs = client.subscribe_console_logs();
    let mut play = client.subscribe_play_mode();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    editor.push(BridgeMessage::event(
        "consoleLog",
        json!({"message": "Compiled", "type": "warning"}),
    ));
    editor.push(BridgeMessage::event(
        "playModeChanged",
        json!({"state": "enteredPlayMode"}),
    ));

    let log = tokio::time::timeout(Duration::from_secs(2), logs.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.message, "Compiled");
    assert_eq!(log.level, LogLevel::Warning);

    let change = tokio::time::timeout(Duration::from_secs(2), play.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change.state, PlayModeState::EnteredPlayMode);
    client.shutdown().await;
}

#[tokio::test]
async fn connection_drop_fails_in_flight_requests() {
    let root = tempfile::tempdir().unwrap();
    let editor = FakeEditor::start(root.path(), silent()).await.unwrap();
    let mut config = fast_config();
    config.command_timeout = Duration::from_secs(10);
    let client = BridgeClient::new(root.path(), config);
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    let (outcome, _) = tokio::join!(
        client.send_command(Category::Scene, "load", json!({})),
        async {
            assert!(editor.wait_for_request("scene.load", Duration::from_secs(2)).await);
            editor.stop().await;
        }
    );
    assert_eq!(outcome.unwrap_err(), BridgeError::ConnectionClosed);
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(next_state(&mut states).await, Reconnecting);
    client.shutdown().await;
}

#[tokio::test]
async fn reload_on_new_port_reconnects_in_one_cycle() {
    let root = tempfile::tempdir().unwrap();
    let first = FakeEditor::start(root.path(), echo()).await.unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    first.stop().await;
    let second = FakeEditor::start(root.path(), echo()).await.unwrap();
    assert_ne!(first.port(), second.port());

    assert_eq!(next_state(&mut states).await, Reconnecting);
    assert_eq!(next_state(&mut states).await, Connecting);
    assert_eq!(next_state(&mut states).await, Connected);
    assert_eq!(second.accepted(), 1);

    let response = client
        .send_command(Category::Editor, "status", json!({}))
        .await
        .unwrap();
    assert!(response.success);
    client.shutdown().await;
}

#[tokio::test]
async fn reconnect_gives_up_after_max_attempts_then_polls_again() {
    let root = tempfile::tempdir().unwrap();
    let first = FakeEditor::start(root.path(), echo()).await.unwrap();
    let mut config = fast_config();
    config.reconnect_delay = Duration::from_millis(20);
    config.poll_interval = Duration::from_millis(200);
    let client = BridgeClient::new(root.path(), config);
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    // The descriptor keeps pointing at the dead port, so every attempt is refused.
    first.stop().await;
    let mut seen = Vec::new();
    loop {
        let state = next_state(&mut states).await;
        seen.push(state);
        if state == Disconnected {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![
            Reconnecting,
            Connecting,
            Reconnecting,
            Connecting,
            Reconnecting,
            Connecting,
            Disconnected
        ]
    );

    let _second = FakeEditor::start(root.path(), echo()).await.unwrap();
    wait_for_state(&mut states, Connected).await;
    client.shutdown().await;
}

#[tokio::test]
async fn zero_attempts_goes_straight_to_disconnected() {
    let root = tempfile::tempdir().unwrap();
    let editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    let mut config = fast_config();
    config.max_reconnect_attempts = 0;
    let client = BridgeClient::new(root.path(), config);
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    editor.stop().await;
    assert_eq!(next_state(&mut states).await, Disconnected);
    client.shutdown().await;
}

#[tokio::test]
async fn forced_disconnect_fails_pending_and_stays_down() {
    let root = tempfile::tempdir().unwrap();
    let editor = FakeEditor::start(root.path(), silent()).await.unwrap();
    let mut config = fast_config();
    config.command_timeout = Duration::from_secs(10);
    let client = BridgeClient::new(root.path(), config);
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    let (outcome, _) = tokio::join!(
        client.send_command(Category::Prefab, "instantiate", json!({})),
        async {
            assert!(
                editor
                    .wait_for_request("prefab.instantiate", Duration::from_secs(2))
                    .await
            );
            client.disconnect().await;
        }
    );
    assert_eq!(outcome.unwrap_err(), BridgeError::ConnectionClosed);
    assert_eq!(client.state(), Disconnected);
    assert_eq!(next_state(&mut states).await, Disconnected);

    // The editor is still up, yet nothing reconnects on its own.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(states.try_recv().is_err());
    assert_eq!(editor.accepted(), 1);

    // A second disconnect is harmless.
    client.disconnect().await;
    assert_eq!(client.state(), Disconnected);

    client.connect();
    wait_for_state(&mut states, Connected).await;
    assert_eq!(editor.accepted(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn connect_during_disconnect_keeps_the_new_session() {
    let root = tempfile::tempdir().unwrap();
    let editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    // The connect runs while disconnect is still waiting for the old driver.
    tokio::join!(client.disconnect(), async { client.connect() });
    wait_for_state(&mut states, Connected).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(client.is_connected());
    let response = client
        .send_command(Category::Scene, "save", json!({}))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(editor.accepted(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_is_idempotent_and_final() {
    let root = tempfile::tempdir().unwrap();
    let _editor = FakeEditor::start(root.path(), echo()).await.unwrap();
    let client = BridgeClient::new(root.path(), fast_config());
    let mut states = client.subscribe_state();
    client.connect();
    wait_for_state(&mut states, Connected).await;

    client.shutdown().await;
    client.shutdown().await;
    assert_eq!(client.state(), Disconnected);

    client.connect();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), Disconnected);
}
