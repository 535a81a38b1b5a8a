// Integration tests for the Coordinator against a wiremock device.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tsuryphone_api::device::StatusDelta;
use tsuryphone_core::{ConnectionHealth, Coordinator, CoreError, DeviceAction, DeviceConfig, PhoneState};

// ── Helpers ─────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> DeviceConfig {
    let url: url::Url = server.uri().parse().unwrap();
    DeviceConfig {
        host: url.host_str().unwrap().to_owned(),
        port: url.port().unwrap(),
        stream_enabled: false,
        ..DeviceConfig::default()
    }
}

async fn mount_status(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_stats(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_healthy_device(server: &MockServer) {
    mount_status(
        server,
        json!({
            "state": "Idle",
            "uptime": 100,
            "wifi": { "connected": true, "rssi": -55, "ssid": "HomeNet" }
        }),
    )
    .await;
    mount_stats(server, json!({"total_calls": 10, "total_blocked_calls": 1})).await;
}

fn delta(value: serde_json::Value) -> StatusDelta {
    serde_json::from_value(value).unwrap()
}

async fn count_requests(server: &MockServer, want: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == want)
        .count()
}

// ── Merge semantics ─────────────────────────────────────────────────

#[tokio::test]
async fn poll_then_delta_keeps_most_recent_value_per_field() {
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    let coordinator = Coordinator::new(config_for(&server)).unwrap();

    coordinator.refresh_cycle().await;
    let state = coordinator.current();
    assert!(state.available);
    let status = state.snapshot.status.clone().unwrap();
    assert_eq!(status.state, PhoneState::Idle);
    assert_eq!(status.uptime_secs, Some(100));

    // A push delta overlays only what it declares.
    coordinator
        .merge_delta(&delta(
            json!({"state": "IncomingCall", "call": {"active": true, "number": "555"}}),
        ))
        .await;

    let status = coordinator.current().snapshot.status.clone().unwrap();
    assert_eq!(status.state, PhoneState::IncomingCall);
    assert_eq!(status.call.number.as_deref(), Some("555"));
    // Carried over from the poll
    assert_eq!(status.uptime_secs, Some(100));
    assert_eq!(status.wifi.ssid.as_deref(), Some("HomeNet"));

    // A later poll is a complete status snapshot and wins wholesale.
    server.reset().await;
    mount_status(&server, json!({"state": "Idle", "uptime": 200})).await;
    mount_stats(&server, json!({"total_calls": 11})).await;
    coordinator.refresh_cycle().await;

    let status = coordinator.current().snapshot.status.clone().unwrap();
    assert_eq!(status.state, PhoneState::Idle);
    assert_eq!(status.uptime_secs, Some(200));
    assert!(!status.call.active);
}

#[tokio::test]
async fn applying_the_same_delta_twice_is_idempotent() {
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    coordinator.refresh_cycle().await;

    let update = delta(json!({"state": "InCall", "call": {"active": true, "id": 7}}));

    coordinator.merge_delta(&update).await;
    let once = coordinator.current().snapshot;

    coordinator.merge_delta(&update).await;
    let twice = coordinator.current().snapshot;

    assert_eq!(*once, *twice);
}

#[tokio::test]
async fn delta_before_any_poll_seeds_the_snapshot() {
    let server = MockServer::start().await;
    let coordinator = Coordinator::new(config_for(&server)).unwrap();

    coordinator
        .merge_delta(&delta(json!({"state": "Dialing"})))
        .await;

    let state = coordinator.current();
    assert_eq!(
        state.snapshot.status.as_ref().map(|s| s.state.clone()),
        Some(PhoneState::Dialing)
    );
    // A live push channel counts as an available source.
    assert!(state.available);
}

// ── Degradation and recovery ────────────────────────────────────────

#[tokio::test]
async fn consecutive_poll_failures_drop_availability_but_keep_data() {
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    let mut config = config_for(&server);
    config.failure_threshold = 3;
    let coordinator = Coordinator::new(config).unwrap();

    coordinator.refresh_cycle().await;
    assert!(coordinator.current().available);

    // Device goes dark.
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    coordinator.refresh_cycle().await;
    coordinator.refresh_cycle().await;
    assert!(coordinator.current().available, "below threshold, still available");

    coordinator.refresh_cycle().await;
    let state = coordinator.current();
    assert!(!state.available, "threshold reached");

    // Last good values stay readable.
    let status = state.snapshot.status.clone().unwrap();
    assert_eq!(status.state, PhoneState::Idle);
    assert_eq!(status.uptime_secs, Some(100));

    let health = coordinator.connection_health().await;
    assert_eq!(health.poll.health, ConnectionHealth::Failed);
    assert_eq!(health.poll.consecutive_failures, 3);

    // One success restores availability and updates fields.
    server.reset().await;
    mount_status(&server, json!({"state": "InCall", "uptime": 900})).await;
    mount_stats(&server, json!({"total_calls": 12})).await;
    coordinator.refresh_cycle().await;

    let state = coordinator.current();
    assert!(state.available);
    let status = state.snapshot.status.clone().unwrap();
    assert_eq!(status.state, PhoneState::InCall);
    assert_eq!(status.uptime_secs, Some(900));
}

#[tokio::test]
async fn partial_poll_still_counts_as_success() {
    let server = MockServer::start().await;
    mount_status(&server, json!({"state": "Idle"})).await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    coordinator.refresh_cycle().await;

    let state = coordinator.current();
    assert!(state.available);
    assert!(state.snapshot.status.is_some());
    assert!(state.snapshot.stats.is_none());
}

#[tokio::test]
async fn polling_alone_keeps_the_snapshot_advancing() {
    // Stream disabled: state must advance purely from the poll source.
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    let coordinator = Coordinator::new(config_for(&server)).unwrap();

    coordinator.refresh_cycle().await;
    assert_eq!(
        coordinator.current().snapshot.status.clone().unwrap().uptime_secs,
        Some(100)
    );

    server.reset().await;
    mount_status(&server, json!({"state": "Idle", "uptime": 160})).await;
    mount_stats(&server, json!({"total_calls": 10})).await;
    coordinator.refresh_cycle().await;

    assert_eq!(
        coordinator.current().snapshot.status.clone().unwrap().uptime_secs,
        Some(160)
    );
}

// ── Actions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn call_action_acks_and_triggers_fast_refresh() {
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_json(json!({"action": "call_custom", "number": "555"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.fast_interval = Duration::from_millis(50);
    config.fast_window_cycles = 3;
    let coordinator = Coordinator::new(config).unwrap();

    coordinator.start().await;
    let polls_before = count_requests(&server, "/status").await;

    let ack = coordinator
        .request_action(DeviceAction::CallCustom {
            number: "555".into(),
        })
        .await
        .unwrap();
    assert_eq!(ack, json!({"ok": true}));

    // The out-of-band refresh plus the fast window should land well
    // within half a second; the normal interval alone (60s) would not
    // produce a single additional poll.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let polls_after = count_requests(&server, "/status").await;
    assert!(
        polls_after >= polls_before + 2,
        "expected immediate + fast-window polls, got {polls_before} -> {polls_after}"
    );

    // Fast window exhausted: cadence reverts to the normal interval and
    // no further polls arrive.
    let settled = count_requests(&server, "/status").await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(count_requests(&server, "/status").await, settled);

    assert!(coordinator.pending_actions().is_empty());
    coordinator.shutdown().await;
}

#[tokio::test]
async fn rejected_action_propagates_to_the_caller() {
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    Mock::given(method("POST"))
        .and(path("/action"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": "line busy"})))
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    coordinator.refresh_cycle().await;

    let err = coordinator
        .request_action(DeviceAction::CallCustom {
            number: "555".into(),
        })
        .await
        .unwrap_err();

    match err {
        CoreError::Rejected { action, message } => {
            assert_eq!(action, "call_custom");
            assert_eq!(message, "line busy");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }

    // The failure neither corrupts the snapshot nor drops availability.
    let state = coordinator.current();
    assert!(state.available);
    assert_eq!(
        state.snapshot.status.as_ref().map(|s| s.state.clone()),
        Some(PhoneState::Idle)
    );
    assert!(coordinator.pending_actions().is_empty());
}

#[tokio::test]
async fn mutating_action_refreshes_its_config_section() {
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    Mock::given(method("POST"))
        .and(path("/action"))
        .and(body_json(json!({"action": "blocked_add", "number": "666"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blocked_numbers": ["666"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    coordinator
        .request_action(DeviceAction::BlockNumber {
            number: "666".into(),
        })
        .await
        .unwrap();

    assert_eq!(
        coordinator.current().snapshot.blocked.clone(),
        Some(vec!["666".to_owned()])
    );
}

// ── On-demand sections ──────────────────────────────────────────────

#[tokio::test]
async fn dnd_section_loads_once_on_demand() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dnd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "force_enabled": true,
            "schedule_enabled": false,
            "start_hour": 22, "start_minute": 0,
            "end_hour": 7, "end_minute": 30
        })))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config_for(&server)).unwrap();

    let dnd = coordinator.dnd().await.unwrap();
    assert!(dnd.force_enabled);
    assert_eq!(dnd.end_minute, 30);

    // Second read is served from the snapshot (expect(1) enforces it).
    let again = coordinator.dnd().await.unwrap();
    assert_eq!(dnd, again);
}

#[tokio::test]
async fn phonebook_section_loads_on_demand() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/phonebook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{ "name": "Dana", "number": "0521112222" }]
        })))
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    let entries = coordinator.phonebook().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Dana");
}

// ── Startup ─────────────────────────────────────────────────────────

#[tokio::test]
async fn start_registers_webhook_server_on_device() {
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    Mock::given(method("POST"))
        .and(path("/webhooks"))
        .and(body_json(json!({"server_url": "http://ha.local:8123"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.webhook_base_url = Some("ha.local:8123".into());
    let coordinator = Coordinator::new(config).unwrap();

    coordinator.start().await;
    assert!(coordinator.current().available);
    coordinator.shutdown().await;

    server.verify().await;
}

#[tokio::test]
async fn start_survives_a_dark_device() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    coordinator.start().await;

    let state = coordinator.current();
    assert!(!state.available);
    assert!(state.snapshot.status.is_none());
    coordinator.shutdown().await;
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test]
async fn subscribers_observe_merges() {
    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    let coordinator = Coordinator::new(config_for(&server)).unwrap();

    let mut rx = coordinator.subscribe();
    coordinator.refresh_cycle().await;

    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("notification within a second")
        .unwrap();
    let observed = rx.borrow().clone();
    assert!(observed.available);
    assert_eq!(
        observed.snapshot.status.as_ref().map(|s| s.state.clone()),
        Some(PhoneState::Idle)
    );
}

#[tokio::test]
async fn state_stream_yields_snapshots() {
    use futures_util::StreamExt;

    let server = MockServer::start().await;
    mount_healthy_device(&server).await;
    let coordinator = Coordinator::new(config_for(&server)).unwrap();

    let mut stream = coordinator.state_stream();

    // First item is the state at subscription time.
    let initial = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("initial item")
        .unwrap();
    assert!(!initial.available);

    coordinator.refresh_cycle().await;
    let updated = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("updated item")
        .unwrap();
    assert!(updated.available);
}
