//! Integration tests for the sync orchestrator

use pin_mirror::{
    error::{SyncError, TransportError},
    hal::{MockLink, ScriptedTransport},
    serializer::PinsBlob,
    Endpoint, JsonPinsFormatter, PinMode, PinRegistry, ServerCommand, StateSerializer,
    SyncOrchestrator, SyncPhase,
};
use serde_json::{json, Value};

const NODE: &str = "mac-aabbccddeeff";
const INTERVAL: i64 = 25;

fn registry() -> PinRegistry {
    let mut pins = PinRegistry::new();
    pins.register_pin(4, "Button", PinMode::Input);
    pins.register_pin(11, "LED", PinMode::Output);
    pins.set_value_string(11, "On");
    pins
}

fn orchestrator(transport: ScriptedTransport) -> SyncOrchestrator<ScriptedTransport> {
    SyncOrchestrator::new(
        transport,
        Endpoint::new("192.168.0.10", 5000),
        NODE,
        INTERVAL as u32,
    )
}

fn payload(sync: &SyncOrchestrator<ScriptedTransport>, cycle: usize) -> Value {
    serde_json::from_str(&sync.transport().sent[cycle].payload).unwrap()
}

fn connect_fail() -> SyncError {
    SyncError::Transport(TransportError::Connect)
}

// =========================================================================
// Registry and serializer properties
// =========================================================================

#[test]
fn revision_moves_only_on_visible_change() {
    let mut pins = PinRegistry::new();
    let mut last = pins.revision();

    let mut step = |pins: &PinRegistry, expect_bump: bool| {
        let now = pins.revision();
        if expect_bump {
            assert!(now > last, "expected bump at revision {}", last);
        } else {
            assert_eq!(now, last);
        }
        last = now;
    };

    pins.register_pin(4, "Button", PinMode::Input);
    step(&pins, true);
    pins.register_pin(4, "Button", PinMode::Input);
    step(&pins, false);
    pins.set_value_string(4, "1");
    step(&pins, true);
    pins.set_value_string(4, "1");
    step(&pins, false);
    pins.set_name(4, "Knob");
    step(&pins, true);
    pins.register_pin(4, "Knob", PinMode::PullUp);
    step(&pins, true);
    pins.set_value_string(30, "1");
    step(&pins, false);
    pins.set_value_string(7, "1"); // not configured
    step(&pins, false);
}

#[test]
fn serialization_is_idempotent() {
    let pins = registry();
    let serializer = StateSerializer::new(JsonPinsFormatter);

    let mut first = PinsBlob::new();
    let mut second = PinsBlob::new();
    serializer.serialize(&pins, &mut first);
    serializer.serialize(&pins, &mut second);

    assert_eq!(first.as_str(), second.as_str());
}

#[test]
fn serialized_registry_round_trips() {
    let mut pins = PinRegistry::new();
    pins.register_pin(4, "Button", PinMode::Input);
    pins.set_value_string(4, "0");
    pins.register_pin(11, "LED", PinMode::Output);
    pins.set_value_string(11, "On");

    let mut blob = PinsBlob::new();
    let report = StateSerializer::new(JsonPinsFormatter).serialize(&pins, &mut blob);
    assert!(!report.truncated);

    let parsed: Value = serde_json::from_str(blob.as_str()).unwrap();
    assert_eq!(
        parsed,
        json!({
            "GPIO4": {"n": "Button", "m": "input", "v": "0"},
            "GPIO11": {"n": "LED", "m": "output", "v": "On"},
        })
    );
}

// =========================================================================
// Timing
// =========================================================================

#[test]
fn cycle_runs_when_interval_accumulates() {
    let pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::always_ok());

    sync.update(10, &pins, &link);
    sync.update(10, &pins, &link);
    assert!(sync.transport().sent.is_empty());

    sync.update(5, &pins, &link);
    assert_eq!(sync.transport().sent.len(), 1);
}

#[test]
fn overshoot_carries_into_next_cycle() {
    let pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::always_ok());

    // 60 ms runs one cycle and banks 35
    sync.update(60, &pins, &link);
    assert_eq!(sync.transport().sent.len(), 1);
    assert_eq!(sync.session().time_accumulator_ms, 35);

    sync.update(1, &pins, &link);
    assert_eq!(sync.transport().sent.len(), 2);
    assert_eq!(sync.session().time_accumulator_ms, 11);
}

#[test]
fn non_positive_elapsed_is_ignored() {
    let pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::always_ok());

    sync.update(20, &pins, &link);
    sync.update(0, &pins, &link);
    sync.update(-500, &pins, &link);
    assert_eq!(sync.session().time_accumulator_ms, 20);
    assert!(sync.transport().sent.is_empty());
}

#[test]
fn link_down_skips_transport() {
    let pins = registry();
    let link = MockLink::down();
    let mut sync = orchestrator(ScriptedTransport::always_ok());

    assert!(!sync.update(INTERVAL, &pins, &link));
    assert!(sync.transport().sent.is_empty());
    assert_eq!(sync.phase(&link), SyncPhase::Disconnected);

    link.set_up(true);
    assert_eq!(sync.phase(&link), SyncPhase::AwaitingHandshake);
    assert!(sync.update(INTERVAL, &pins, &link));
    assert_eq!(sync.phase(&link), SyncPhase::Synchronized);
}

#[test]
fn link_loss_clears_blink() {
    let pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::new().then_reply(ServerCommand::ok().with_blink(true)));

    sync.update(INTERVAL, &pins, &link);
    assert!(sync.should_blink());

    link.set_up(false);
    sync.update(INTERVAL, &pins, &link);
    assert!(!sync.is_connected());
    assert!(!sync.session().should_blink);
}

// =========================================================================
// Handshake
// =========================================================================

#[test]
fn handshake_then_quiet_cycle() {
    let mut pins = PinRegistry::new();
    pins.register_pin(4, "Button", PinMode::Input);
    pins.set_value_string(4, "0");

    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::always_ok());

    // Cycle 1: identity only
    sync.update(INTERVAL, &pins, &link);
    assert_eq!(sync.transport().sent[0].payload, r#"{"node_id":"mac-aabbccddeeff"}"#);
    assert_eq!(payload(&sync, 0), json!({"node_id": NODE}));

    let session = sync.session();
    assert!(session.handshake_done);
    assert_eq!(session.last_sent_description.as_str(), "");
    assert_eq!(session.last_sent_pins.as_str(), sync.pins_blob());
    assert!(sync.pins_blob().contains("\"GPIO4\""));

    // Cycle 2: nothing changed, nothing but identity goes out
    sync.update(INTERVAL, &pins, &link);
    let second = payload(&sync, 1);
    assert!(second.get("description").is_none());
    assert!(second.get("pins").is_none());
    assert_eq!(second, json!({"node_id": NODE}));
}

#[test]
fn failed_handshake_is_retried() {
    let pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::new().then_fail(connect_fail()).then_ok());

    sync.update(INTERVAL, &pins, &link);
    assert!(!sync.session().handshake_done);
    assert!(!sync.is_connected());
    assert_eq!(sync.phase(&link), SyncPhase::AwaitingHandshake);

    sync.update(INTERVAL, &pins, &link);
    assert!(sync.session().handshake_done);
    assert_eq!(sync.transport().sent[1].payload, sync.transport().sent[0].payload);
}

#[test]
fn server_assigned_identity_is_used_afterwards() {
    let pins = registry();
    let link = MockLink::up();
    let transport = ScriptedTransport::new().then_reply(
        ServerCommand::ok()
            .with_node_id("kitchen-node")
            .with_description("Kitchen"),
    );
    let mut sync = orchestrator(transport);

    sync.update(INTERVAL, &pins, &link);
    assert_eq!(sync.session().node_id.as_str(), "kitchen-node");
    // Handshake baseline includes the assigned description, so it is not echoed
    assert_eq!(sync.session().last_sent_description.as_str(), "Kitchen");

    sync.update(INTERVAL, &pins, &link);
    assert_eq!(payload(&sync, 1), json!({"node_id": "kitchen-node"}));
}

#[test]
fn empty_override_keeps_identity() {
    let pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::new().then_reply(ServerCommand::ok().with_node_id("")));

    sync.update(INTERVAL, &pins, &link);
    assert_eq!(sync.session().node_id.as_str(), NODE);
}

// =========================================================================
// Deltas
// =========================================================================

#[test]
fn description_change_sends_only_description() {
    let pins = registry();
    let link = MockLink::up();
    let transport = ScriptedTransport::new()
        .then_ok()
        .then_reply(ServerCommand::ok().with_description("Porch"));
    let mut sync = orchestrator(transport);

    sync.update(INTERVAL, &pins, &link); // handshake
    sync.update(INTERVAL, &pins, &link); // description assigned
    sync.update(INTERVAL, &pins, &link);

    let delta = payload(&sync, 2);
    assert_eq!(delta["description"], "Porch");
    assert!(delta.get("pins").is_none());
    assert!(delta.get("full_sync").is_none());

    // Acknowledged, so the next cycle is quiet again
    sync.update(INTERVAL, &pins, &link);
    assert_eq!(payload(&sync, 3), json!({"node_id": NODE}));
}

#[test]
fn pin_change_sends_only_pins() {
    let mut pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::always_ok());

    sync.update(INTERVAL, &pins, &link); // handshake
    pins.set_value_string(4, "1");
    sync.update(INTERVAL, &pins, &link);

    let delta = payload(&sync, 1);
    assert!(delta.get("description").is_none());
    assert_eq!(delta["pins"]["GPIO4"]["v"], "1");
    assert_eq!(delta["pins"]["GPIO11"]["v"], "On");

    sync.update(INTERVAL, &pins, &link);
    assert!(payload(&sync, 2).get("pins").is_none());
}

#[test]
fn change_and_revert_between_cycles_sends_nothing() {
    let mut pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::always_ok());

    sync.update(INTERVAL, &pins, &link);
    pins.set_value_string(4, "1");
    pins.set_value_string(4, "0");
    sync.update(INTERVAL, &pins, &link);

    assert!(!sync.transport().sent[1].send_pins);
}

// =========================================================================
// Forced full sync
// =========================================================================

#[test]
fn forced_full_sync_is_one_shot() {
    let pins = registry();
    let link = MockLink::up();
    let transport = ScriptedTransport::new()
        .then_ok()
        .then_reply(ServerCommand::ok().with_force_full_sync(true));
    let mut sync = orchestrator(transport);

    sync.update(INTERVAL, &pins, &link); // handshake
    sync.update(INTERVAL, &pins, &link); // directive arrives
    assert!(sync.session().pending_force_full_sync);

    sync.update(INTERVAL, &pins, &link);
    let full = payload(&sync, 2);
    assert_eq!(full["full_sync"], true);
    assert_eq!(full["description"], "");
    assert!(full["pins"].get("GPIO4").is_some());

    sync.update(INTERVAL, &pins, &link);
    sync.update(INTERVAL, &pins, &link);
    assert!(!sync.session().pending_force_full_sync);
    assert_eq!(payload(&sync, 3), json!({"node_id": NODE}));
    assert_eq!(payload(&sync, 4), json!({"node_id": NODE}));
}

#[test]
fn forced_full_sync_requested_at_handshake_waits_for_next_cycle() {
    let pins = registry();
    let link = MockLink::up();
    let transport =
        ScriptedTransport::new().then_reply(ServerCommand::ok().with_force_full_sync(true));
    let mut sync = orchestrator(transport);

    sync.update(INTERVAL, &pins, &link);
    assert_eq!(payload(&sync, 0), json!({"node_id": NODE}));
    assert!(sync.session().pending_force_full_sync);

    sync.update(INTERVAL, &pins, &link);
    let full = &sync.transport().sent[1];
    assert!(full.send_full_sync && full.send_desc && full.send_pins);
}

#[test]
fn forced_full_sync_survives_failure() {
    let pins = registry();
    let link = MockLink::up();
    let transport = ScriptedTransport::new()
        .then_ok()
        .then_reply(ServerCommand::ok().with_force_full_sync(true))
        .then_fail(connect_fail());
    let mut sync = orchestrator(transport);

    for _ in 0..3 {
        sync.update(INTERVAL, &pins, &link);
    }
    assert!(sync.session().pending_force_full_sync);

    sync.update(INTERVAL, &pins, &link);
    assert!(sync.transport().sent[3].send_full_sync);
    assert!(!sync.session().pending_force_full_sync);
}

// =========================================================================
// Failure handling
// =========================================================================

#[test]
fn failed_cycle_leaves_baselines_and_retries_delta() {
    let mut pins = registry();
    let link = MockLink::up();
    let transport = ScriptedTransport::new()
        .then_ok()
        .then_fail(connect_fail())
        .then_ok();
    let mut sync = orchestrator(transport);

    sync.update(INTERVAL, &pins, &link); // handshake
    let baseline_pins = sync.session().last_sent_pins.clone();
    let baseline_desc = sync.session().last_sent_description.clone();

    pins.set_value_string(4, "1");
    assert!(!sync.update(INTERVAL, &pins, &link));

    let session = sync.session();
    assert!(session.handshake_done);
    assert_eq!(session.last_sent_pins, baseline_pins);
    assert_eq!(session.last_sent_description, baseline_desc);
    assert_eq!(sync.phase(&link), SyncPhase::Disconnected);

    assert!(sync.update(INTERVAL, &pins, &link));
    let sent = &sync.transport().sent;
    assert!(sent[1].send_pins);
    assert_eq!(sent[1].payload, sent[2].payload);
    assert_eq!(sync.session().last_sent_pins.as_str(), sync.pins_blob());
}

#[test]
fn failure_suppresses_blink_until_server_says_again() {
    let pins = registry();
    let link = MockLink::up();
    let transport = ScriptedTransport::new()
        .then_reply(ServerCommand::ok().with_blink(true))
        .then_fail(connect_fail())
        .then_reply(ServerCommand::ok().with_blink(true));
    let mut sync = orchestrator(transport);

    sync.update(INTERVAL, &pins, &link);
    assert!(sync.should_blink());

    sync.update(INTERVAL, &pins, &link);
    assert!(!sync.should_blink());

    sync.update(INTERVAL, &pins, &link);
    assert!(sync.should_blink());
}

#[test]
fn missing_directive_keeps_previous_blink() {
    let pins = registry();
    let link = MockLink::up();
    let transport = ScriptedTransport::new()
        .then_reply(ServerCommand::ok().with_blink(true))
        .then_no_directive();
    let mut sync = orchestrator(transport);

    sync.update(INTERVAL, &pins, &link);
    sync.update(INTERVAL, &pins, &link);
    assert!(sync.is_connected());
    assert!(sync.should_blink());
}

#[test]
fn transport_sees_configured_endpoint() {
    let pins = registry();
    let link = MockLink::up();
    let mut sync = orchestrator(ScriptedTransport::always_ok());

    sync.update(INTERVAL, &pins, &link);
    assert_eq!(
        sync.transport().last_endpoint,
        Some(Endpoint::new("192.168.0.10", 5000))
    );
}
