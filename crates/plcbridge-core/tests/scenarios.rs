//! End-to-end behaviour of the bridge against in-process transports.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use plcbridge_core::{Bridge, BridgeService, BridgeSettings, CommandOutcome, Lane};
use plcbridge_middleware::{BusMessage, EventBus, TopicSubscriber, Transport};
use plcbridge_types::{BridgeError, PlcStatus};
use serde_json::{Value, json};
use tokio::sync::watch;

const ORDER_TOPIC: &str = "meili/v2/Roboligent/DEX0002/order";
const INSTANT_TOPIC: &str = "meili/v2/Roboligent/DEX0002/instantActions";
const STATE_TOPIC: &str = "meili/v2/Roboligent/DEX0002/state";
const RESPONSE_TOPIC: &str = "bridge/response";

// ── Test doubles ─────────────────────────────────────────────────────────

/// Records every publish, then forwards it to an inner bus.
#[derive(Default)]
struct RecordingTransport {
    bus: EventBus,
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    fn published_on(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn json_on(&self, topic: &str) -> Vec<Value> {
        self.published_on(topic)
            .iter()
            .map(|p| serde_json::from_str(p).unwrap())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), BridgeError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), String::from_utf8_lossy(&payload).into_owned()));
        Transport::publish(&self.bus, topic, payload, retain)
    }

    fn subscribe(&self, filter: &str) -> Result<TopicSubscriber, BridgeError> {
        Transport::subscribe(&self.bus, filter)
    }
}

/// Refuses robot-bound publishes; PLC responses are recorded.
#[derive(Default)]
struct RobotLinkDown {
    responses: Mutex<Vec<String>>,
}

impl Transport for RobotLinkDown {
    fn publish(&self, topic: &str, payload: Vec<u8>, _retain: bool) -> Result<(), BridgeError> {
        if topic == RESPONSE_TOPIC {
            self.responses
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&payload).into_owned());
            return Ok(());
        }
        Err(BridgeError::Transport(format!("not connected: {topic}")))
    }

    fn subscribe(&self, filter: &str) -> Result<TopicSubscriber, BridgeError> {
        Err(BridgeError::Transport(format!("not connected: {filter}")))
    }
}

fn recording_bridge() -> (Arc<RecordingTransport>, Bridge) {
    let transport = Arc::new(RecordingTransport::default());
    let bridge = Bridge::new(BridgeSettings::default(), transport.clone());
    (transport, bridge)
}

fn dispatched(outcome: CommandOutcome) -> String {
    match outcome {
        CommandOutcome::OrderDispatched { order_id } => order_id,
        other => panic!("expected an order, got {other:?}"),
    }
}

fn report(order_id: &str, statuses: &[&str]) -> Vec<u8> {
    let states: Vec<Value> = statuses
        .iter()
        .enumerate()
        .map(|(i, s)| json!({ "actionId": format!("a{i}"), "actionStatus": s }))
        .collect();
    serde_json::to_vec(&json!({ "orderId": order_id, "actionStates": states })).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[test]
fn inference_order_runs_to_success() {
    let (transport, bridge) = recording_bridge();

    let order_id = dispatched(bridge.handle_command(b"PICK:I"));

    let orders = transport.json_on(ORDER_TOPIC);
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order["orderId"], order_id.as_str());
    assert_eq!(order["orderUpdateId"], 0);
    assert_eq!(order["version"], "2.0.0");
    assert_eq!(order["manufacturer"], "Roboligent");
    assert_eq!(order["serialNumber"], "DEX0002");
    assert_eq!(order["edges"], json!([]));
    let action = &order["nodes"][0]["actions"][0];
    assert_eq!(action["actionType"], "Roboligent Robin - Inference");
    assert_eq!(action["blockingType"], "NONE");
    assert_eq!(
        action["actionParameters"],
        json!([{ "key": "inference_name", "value": "PICK" }])
    );
    assert_eq!(bridge.tracker().lookup_active(&order_id).as_deref(), Some("PICK:I"));

    let running = bridge
        .handle_state(STATE_TOPIC, &report(&order_id, &["RUNNING"]))
        .unwrap();
    assert_eq!(running.verdict, PlcStatus::Running);
    assert!(!running.removed);

    let done = bridge
        .handle_state(STATE_TOPIC, &report(&order_id, &["FINISHED"]))
        .unwrap();
    assert_eq!(done.verdict, PlcStatus::Success);
    assert!(done.removed);

    assert_eq!(transport.published_on(RESPONSE_TOPIC), vec!["PICK:R", "PICK:S"]);
    assert_eq!(bridge.tracker().active_len(), 0);
}

#[test]
fn left_arm_trajectory_parameters() {
    let (transport, bridge) = recording_bridge();
    dispatched(bridge.handle_command(b"MOVE:T:L"));

    let orders = transport.json_on(ORDER_TOPIC);
    let action = &orders[0]["nodes"][0]["actions"][0];
    assert_eq!(action["actionType"], "Roboligent Robin - Follow Trajectory");
    assert_eq!(
        action["actionParameters"],
        json!([
            { "key": "trajectory_name", "value": "MOVE" },
            { "key": "arm", "value": "left" },
        ])
    );
}

#[test]
fn invalid_type_fails_immediately() {
    let (transport, bridge) = recording_bridge();

    let outcome = bridge.handle_command(b"FOO:X");
    assert!(matches!(
        outcome,
        CommandOutcome::Rejected { error: BridgeError::MalformedCommand(_) }
    ));
    assert!(transport.published_on(ORDER_TOPIC).is_empty());
    assert_eq!(transport.published_on(RESPONSE_TOPIC), vec!["FOO:F"]);
    assert_eq!(bridge.tracker().active_len(), 0);
}

#[test]
fn cancel_then_failed_report_closes_the_order() {
    let (transport, bridge) = recording_bridge();
    let order_id = dispatched(bridge.handle_command(b"PICK:I"));

    let outcome = bridge.handle_command(b"PICK:C");
    assert_eq!(
        outcome,
        CommandOutcome::CancelDispatched { order_id: order_id.clone() }
    );

    let cancels = transport.json_on(INSTANT_TOPIC);
    assert_eq!(cancels.len(), 1);
    assert_eq!(cancels[0]["actions"][0]["actionType"], "cancelOrder");
    assert_eq!(cancels[0]["actions"][0]["blockingType"], "HARD");
    assert_eq!(bridge.tracker().lookup_active(&order_id), None);
    assert_eq!(bridge.tracker().lookup_canceled(&order_id).as_deref(), Some("PICK:C"));

    let settled = bridge
        .handle_state(STATE_TOPIC, &report(&order_id, &["FAILED"]))
        .unwrap();
    assert_eq!(settled.lane, Lane::Canceled);
    assert_eq!(settled.verdict, PlcStatus::Failed);

    assert_eq!(transport.published_on(RESPONSE_TOPIC), vec!["PICK:F"]);
    assert_eq!(bridge.tracker().canceled_len(), 0);
}

#[test]
fn unknown_order_report_is_ignored() {
    let (transport, bridge) = recording_bridge();
    let order_id = dispatched(bridge.handle_command(b"PICK:I"));
    let before = bridge.tracker().snapshot();

    assert!(bridge
        .handle_state(STATE_TOPIC, &report("not-ours", &["FINISHED"]))
        .is_none());

    assert!(transport.published_on(RESPONSE_TOPIC).is_empty());
    assert_eq!(bridge.tracker().snapshot(), before);
    assert!(bridge.tracker().lookup_active(&order_id).is_some());
}

// ── Edge cases ───────────────────────────────────────────────────────────

#[test]
fn cancel_without_target_fails() {
    let (transport, bridge) = recording_bridge();

    let outcome = bridge.handle_command(b"PICK:C");
    assert_eq!(
        outcome,
        CommandOutcome::Rejected {
            error: BridgeError::CancelTargetNotFound("PICK".to_string())
        }
    );
    assert!(transport.published_on(INSTANT_TOPIC).is_empty());
    assert_eq!(transport.published_on(RESPONSE_TOPIC), vec!["PICK:F"]);
    assert_eq!(bridge.tracker().snapshot().last_header_id, 0);
}

#[test]
fn malformed_report_is_dropped() {
    let (transport, bridge) = recording_bridge();
    let order_id = dispatched(bridge.handle_command(b"PICK:I"));

    assert!(bridge.handle_state(STATE_TOPIC, b"{not json").is_none());
    assert!(bridge
        .handle_state(STATE_TOPIC, br#"{"actionStates":[]}"#)
        .is_none());

    assert!(transport.published_on(RESPONSE_TOPIC).is_empty());
    assert!(bridge.tracker().lookup_active(&order_id).is_some());
}

#[test]
fn odd_action_entries_do_not_hide_a_failure() {
    let (transport, bridge) = recording_bridge();
    let order_id = dispatched(bridge.handle_command(b"PICK:I"));

    let raw = json!({
        "orderId": order_id,
        "actionStates": [
            { "actionId": "x", "actionStatus": null },
            { "actionId": "y", "actionStatus": "FAILED" },
        ],
    });
    let settled = bridge
        .handle_state(STATE_TOPIC, &serde_json::to_vec(&raw).unwrap())
        .unwrap();
    assert_eq!(settled.verdict, PlcStatus::Failed);
    assert_eq!(bridge.tracker().active_len(), 0);
    assert_eq!(transport.published_on(RESPONSE_TOPIC), vec!["PICK:F"]);
}

#[test]
fn numeric_action_id_still_finishes_the_order() {
    let (transport, bridge) = recording_bridge();
    let order_id = dispatched(bridge.handle_command(b"PICK:I"));

    let raw = json!({
        "orderId": order_id,
        "actionStates": [{ "actionId": 5, "actionStatus": "FINISHED" }],
    });
    let settled = bridge
        .handle_state(STATE_TOPIC, &serde_json::to_vec(&raw).unwrap())
        .unwrap();
    assert_eq!(settled.verdict, PlcStatus::Success);
    assert_eq!(bridge.tracker().active_len(), 0);
    assert_eq!(transport.published_on(RESPONSE_TOPIC), vec!["PICK:S"]);
}

#[test]
fn canceled_lane_is_checked_before_active() {
    let (transport, bridge) = recording_bridge();
    let order_id = dispatched(bridge.handle_command(b"PICK:I"));
    bridge.handle_command(b"PICK:C");

    // A RUNNING action would give Running on the active lane; the canceled
    // lane skips it and settles on the FINISHED one.
    let settled = bridge
        .handle_state(STATE_TOPIC, &report(&order_id, &["RUNNING", "FINISHED"]))
        .unwrap();
    assert_eq!(settled.lane, Lane::Canceled);
    assert_eq!(settled.verdict, PlcStatus::Success);
    assert_eq!(settled.command, "PICK:C");
    assert_eq!(transport.published_on(RESPONSE_TOPIC), vec!["PICK:S"]);
}

#[test]
fn canceled_order_without_terminal_action_stays() {
    let (transport, bridge) = recording_bridge();
    let order_id = dispatched(bridge.handle_command(b"PICK:I"));
    bridge.handle_command(b"PICK:C");

    assert!(bridge
        .handle_state(STATE_TOPIC, &report(&order_id, &["RUNNING", "PAUSED"]))
        .is_none());
    assert_eq!(bridge.tracker().canceled_len(), 1);
    assert!(transport.published_on(RESPONSE_TOPIC).is_empty());
}

#[test]
fn header_ids_increase_across_message_kinds() {
    let (transport, bridge) = recording_bridge();
    bridge.handle_command(b"PICK:I");
    bridge.handle_command(b"MOVE:T");
    bridge.handle_command(b"PICK:C");
    bridge.handle_command(b"WAVE:I");

    let mut headers: Vec<i64> = transport
        .json_on(ORDER_TOPIC)
        .iter()
        .chain(transport.json_on(INSTANT_TOPIC).iter())
        .map(|m| m["headerId"].as_i64().unwrap())
        .collect();
    headers.sort_unstable();
    assert_eq!(headers, vec![1, 2, 3, 4]);
}

#[test]
fn whitespace_around_commands_is_ignored() {
    let (transport, bridge) = recording_bridge();
    let order_id = dispatched(bridge.handle_command(b"  PICK:I\r\n"));
    assert_eq!(bridge.tracker().lookup_active(&order_id).as_deref(), Some("PICK:I"));
    assert_eq!(transport.published_on(ORDER_TOPIC).len(), 1);
}

#[test]
fn failed_order_publish_is_reported_and_not_tracked() {
    let transport = Arc::new(RobotLinkDown::default());
    let bridge = Bridge::new(BridgeSettings::default(), transport.clone());

    let outcome = bridge.handle_command(b"PICK:I");
    assert!(matches!(
        outcome,
        CommandOutcome::Rejected { error: BridgeError::Transport(_) }
    ));
    assert_eq!(bridge.tracker().active_len(), 0);
    assert_eq!(*transport.responses.lock().unwrap(), vec!["PICK:F"]);
}

#[test]
fn failed_cancel_publish_keeps_order_active() {
    let transport = Arc::new(RobotLinkDown::default());
    let bridge = Bridge::new(BridgeSettings::default(), transport.clone());
    bridge.tracker().record_active("ord-1", "PICK:I");

    let outcome = bridge.handle_command(b"PICK:C");
    assert!(matches!(
        outcome,
        CommandOutcome::Rejected { error: BridgeError::Transport(_) }
    ));
    assert_eq!(bridge.tracker().lookup_active("ord-1").as_deref(), Some("PICK:I"));
    assert_eq!(bridge.tracker().canceled_len(), 0);
    assert_eq!(*transport.responses.lock().unwrap(), vec!["PICK:F"]);
}

// ── Service over the bus ─────────────────────────────────────────────────

async fn next(sub: &mut TopicSubscriber) -> BusMessage {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("timed out")
        .expect("bus closed")
}

#[tokio::test]
async fn service_round_trip_over_event_bus() {
    let bus = Arc::new(EventBus::default());
    let bridge = Arc::new(Bridge::new(BridgeSettings::default(), bus.clone()));
    let mut orders = bus.subscribe(ORDER_TOPIC).unwrap();
    let mut responses = bus.subscribe(RESPONSE_TOPIC).unwrap();

    let (stop_tx, stop_rx) = watch::channel(false);
    let service = tokio::spawn(BridgeService::new(Arc::clone(&bridge)).run(stop_rx));
    tokio::time::sleep(Duration::from_millis(20)).await;

    bus.publish(BusMessage::new("bridge/command", "PICK:I")).unwrap();
    let order: Value = serde_json::from_slice(&next(&mut orders).await.payload).unwrap();
    let order_id = order["orderId"].as_str().unwrap().to_string();

    bus.publish(BusMessage::new(STATE_TOPIC, report(&order_id, &["RUNNING"])))
        .unwrap();
    bus.publish(BusMessage::new(STATE_TOPIC, report(&order_id, &["FINISHED"])))
        .unwrap();

    assert_eq!(next(&mut responses).await.payload_str(), "PICK:R");
    assert_eq!(next(&mut responses).await.payload_str(), "PICK:S");
    assert_eq!(bridge.tracker().active_len(), 0);

    stop_tx.send(true).unwrap();
    service.await.unwrap().unwrap();
}

#[tokio::test]
async fn service_sweeps_stale_orders() {
    let bus = Arc::new(EventBus::default());
    let settings = BridgeSettings {
        order_ttl: Some(Duration::from_millis(30)),
        sweep_interval: Duration::from_millis(10),
        ..BridgeSettings::default()
    };
    let bridge = Arc::new(Bridge::new(settings, bus.clone()));
    let mut responses = bus.subscribe(RESPONSE_TOPIC).unwrap();

    let (stop_tx, stop_rx) = watch::channel(false);
    let service = tokio::spawn(BridgeService::new(Arc::clone(&bridge)).run(stop_rx));
    tokio::time::sleep(Duration::from_millis(20)).await;

    bus.publish(BusMessage::new("bridge/command", "PICK:I")).unwrap();
    assert_eq!(next(&mut responses).await.payload_str(), "PICK:F");
    assert_eq!(bridge.tracker().active_len(), 0);

    stop_tx.send(true).unwrap();
    service.await.unwrap().unwrap();
}

#[tokio::test]
async fn service_refuses_to_start_without_subscriptions() {
    let bridge = Arc::new(Bridge::new(
        BridgeSettings::default(),
        Arc::new(RobotLinkDown::default()),
    ));
    let (_stop_tx, stop_rx) = watch::channel(false);
    let result = BridgeService::new(bridge).run(stop_rx).await;
    assert!(matches!(result, Err(BridgeError::Transport(_))));
}
