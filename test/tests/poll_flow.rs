/// End-to-end flow through the polling bridge against a scripted library.

use serde_json::{json, Value};

use roomlink_client::{
    error_codes, BridgeConfig, ChangeBatch, ChangeValue, DataChange, DecodedValue, EventKind,
    Handle, Lifecycle, MessageType, Operation, PollBridge, RoomEvent, SendPayload,
};
use roomlink_test::{init_logging, ScriptedLibrary, ScriptedRoom};

use std::sync::Arc;

fn joined(bridge: &mut PollBridge, library: &ScriptedLibrary) -> (Handle, Arc<ScriptedRoom>) {
    let client = bridge.create_client("localhost:2567", false);
    let room = bridge.join(client, "lobby", "");
    let scripted = library.join_next("abc", "xyz", "lobby");
    assert_eq!(bridge.poll_event(), EventKind::RoomJoin);
    (room, scripted)
}

#[test]
fn join_lobby_exposes_room_identity() {
    init_logging();
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let client = bridge.create_client("localhost:2567", false);
    assert!(!client.is_none());
    assert_eq!(bridge.get_endpoint(client), "ws://localhost:2567");

    let room = bridge.join(client, "lobby", "");
    library.join_next("abc", "xyz", "lobby");

    assert_eq!(bridge.poll_event(), EventKind::RoomJoin);
    assert_eq!(bridge.event_room(), room);
    assert_eq!(bridge.event_message(), "abc");
    assert_eq!(bridge.room_id(room), "abc");
    assert_eq!(bridge.session_id(room), "xyz");
    assert_eq!(bridge.room_name(room), "lobby");
    assert!(bridge.has_joined(room));
    assert_eq!(bridge.reconnection_token(room), "abc:xyz");

    assert_eq!(bridge.poll_event(), EventKind::None);
    assert_eq!(bridge.event_room(), Handle::NONE);
    assert_eq!(bridge.event_data_length(), 0);
}

#[test]
fn join_request_carries_the_parsed_options() {
    let library = ScriptedLibrary::new();
    let bridge = PollBridge::new(library.clone());
    let client = bridge.create_client("wss://play.example.com/matchmake", false);
    assert_eq!(bridge.get_endpoint(client), "wss://play.example.com");

    bridge.join_or_create(client, "arena", r#"{"mode":"duel"}"#);
    let pending = library.take_pending().unwrap();
    assert_eq!(
        pending.request,
        roomlink_client::JoinRequest::JoinOrCreate {
            name: "arena".to_string(),
            options: json!({"mode": "duel"}),
        }
    );
}

#[test]
fn refused_or_malformed_clients_are_none() {
    let library = ScriptedLibrary::new();
    let bridge = PollBridge::new(library.clone());
    assert!(bridge.create_client("", false).is_none());
    assert!(bridge.create_client("localhost:notaport", false).is_none());

    library.refuse_connections(true);
    assert!(bridge.create_client("localhost:2567", false).is_none());
    assert!(library.endpoints().is_empty());
}

#[test]
fn state_events_carry_json_and_packed_batches() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let (room, scripted) = joined(&mut bridge, &library);

    scripted.replace_state(json!({"round": 1}));
    assert_eq!(bridge.poll_event(), EventKind::StateChange);
    let state: Value = serde_json::from_slice(bridge.event_data()).unwrap();
    assert_eq!(state, json!({"round": 1}));

    scripted.change(vec![
        DataChange::field(0, Operation::ADD, "players", DecodedValue::Node { ref_id: 1 }),
        DataChange::entry(1, Operation::ADD, "alice", DecodedValue::Node { ref_id: 2 }),
        DataChange::field(2, Operation::ADD, "hp", DecodedValue::Integer(10)),
    ]);
    assert_eq!(bridge.poll_event(), EventKind::StateMutation);
    assert_eq!(bridge.event_room(), room);

    let batch = ChangeBatch::from_packed(bridge.event_data()).unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.records()[0].value, ChangeValue::Reference(1));
    assert_eq!(batch.records()[2].ref_id, 2);

    // an empty batch is not delivered
    scripted.change(Vec::new());
    assert_eq!(bridge.poll_event(), EventKind::None);
}

#[test]
fn messages_and_errors_are_queued_in_order() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let (_, scripted) = joined(&mut bridge, &library);

    scripted.message("chat", json!({"text": "hi"}));
    scripted.error(4001, "bad move");

    assert_eq!(bridge.poll_event(), EventKind::Message);
    assert_eq!(bridge.event_message(), "chat");
    assert_eq!(bridge.event_code(), 0);
    let data: Value = serde_json::from_slice(bridge.event_data()).unwrap();
    assert_eq!(data, json!({"text": "hi"}));

    assert_eq!(bridge.poll_event(), EventKind::RoomError);
    assert_eq!(bridge.event_code(), 4001);
    assert_eq!(bridge.event_message(), "bad move");
}

#[test]
fn sends_reach_the_room() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let (room, scripted) = joined(&mut bridge, &library);

    assert!(bridge.send(room, "move", "left"));
    assert!(bridge.send_int(room, 7, "jump"));
    assert!(bridge.send_bytes(room, "blob", &[1, 2, 3]));

    assert_eq!(
        scripted.sent(),
        vec![
            (MessageType::Name("move".to_string()), SendPayload::Text("left".to_string())),
            (MessageType::Code(7), SendPayload::Text("jump".to_string())),
            (MessageType::Name("blob".to_string()), SendPayload::Bytes(vec![1, 2, 3])),
        ]
    );
    assert_eq!(bridge.poll_event(), EventKind::None);
}

#[test]
fn failed_sends_become_send_error_events() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let (room, scripted) = joined(&mut bridge, &library);

    scripted.reject_sends(true);
    assert!(!bridge.send(room, "move", "left"));
    assert_eq!(bridge.poll_event(), EventKind::SendError);
    assert_eq!(bridge.event_room(), room);
    assert_eq!(bridge.event_code(), error_codes::SEND_FAILURE);

    // unknown handles are refused without an event
    assert!(!bridge.send(Handle::from(999), "move", "left"));
    assert_eq!(bridge.poll_event(), EventKind::None);
}

#[test]
fn consented_leave_ends_in_left() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let (room, scripted) = joined(&mut bridge, &library);

    assert!(bridge.leave(room));
    assert_eq!(scripted.leaves(), vec![true]);
    assert_eq!(bridge.poll_event(), EventKind::RoomLeave);
    assert_eq!(bridge.event_code(), roomlink_shared::CLOSE_CONSENTED);
    assert_eq!(bridge.lifecycle(room), Some(Lifecycle::Left));
    assert!(!bridge.has_joined(room));

    // the handle stays readable until freed
    assert_eq!(bridge.room_id(room), "abc");
    assert!(!bridge.send(room, "move", "left"));
    assert_eq!(bridge.poll_event(), EventKind::SendError);

    bridge.free(room);
    assert_eq!(bridge.room_id(room), "");
    assert_eq!(bridge.lifecycle(room), None);
    // already left, so no second disconnect
    assert_eq!(scripted.leaves(), vec![true]);
}

#[test]
fn abnormal_close_ends_in_failed() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let (room, scripted) = joined(&mut bridge, &library);

    scripted.close(1006, "connection lost");
    assert_eq!(bridge.poll_event(), EventKind::RoomLeave);
    assert_eq!(bridge.event_code(), 1006);
    assert_eq!(bridge.event_message(), "connection lost");
    assert_eq!(bridge.lifecycle(room), Some(Lifecycle::Failed));
}

#[test]
fn freeing_a_joined_room_disconnects_it() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let (room, scripted) = joined(&mut bridge, &library);

    bridge.free(room);
    assert_eq!(scripted.leaves(), vec![true]);
    // events from the released room are dropped
    scripted.message("chat", json!("late"));
    assert_eq!(bridge.poll_event(), EventKind::None);
}

#[test]
fn full_queue_drops_the_oldest_events() {
    let library = ScriptedLibrary::new();
    let config = BridgeConfig {
        event_queue_capacity: 4,
        ..BridgeConfig::default()
    };
    let mut bridge = PollBridge::with_config(library.clone(), config);
    let (_, scripted) = joined(&mut bridge, &library);

    for index in 0..6 {
        scripted.message("tick", json!(index));
    }
    assert_eq!(bridge.pending_events(), 4);
    assert_eq!(bridge.dropped_events(), 2);

    let mut seen = Vec::new();
    while bridge.poll_event() == EventKind::Message {
        seen.push(serde_json::from_slice::<Value>(bridge.event_data()).unwrap());
    }
    assert_eq!(seen, vec![json!(2), json!(3), json!(4), json!(5)]);
}

#[test]
fn events_replayed_on_subscribe_follow_the_join() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let client = bridge.create_client("localhost:2567", false);
    let room = bridge.join(client, "lobby", "");

    let scripted = ScriptedRoom::new("abc", "xyz", "lobby");
    scripted.emit_on_subscribe(RoomEvent::StateReplaced(json!({"round": 0})));
    library.take_pending().unwrap().succeed(scripted.clone());

    assert_eq!(bridge.poll_event(), EventKind::RoomJoin);
    assert_eq!(bridge.poll_event(), EventKind::StateChange);
    assert_eq!(bridge.event_room(), room);
    let state: Value = serde_json::from_slice(bridge.event_data()).unwrap();
    assert_eq!(state, json!({"round": 0}));
    assert_eq!(bridge.poll_event(), EventKind::None);
    assert!(scripted.is_subscribed());
}

#[test]
fn unrepresentable_values_raise_an_error_after_the_batch() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let (room, scripted) = joined(&mut bridge, &library);

    scripted.change(vec![DataChange::field(
        0,
        Operation::ADD,
        "blob",
        DecodedValue::Opaque {
            type_name: "Float32Array".to_string(),
        },
    )]);

    assert_eq!(bridge.poll_event(), EventKind::StateMutation);
    let batch = ChangeBatch::from_packed(bridge.event_data()).unwrap();
    assert_eq!(batch.records()[0].value, ChangeValue::Unrepresentable);

    assert_eq!(bridge.poll_event(), EventKind::RoomError);
    assert_eq!(bridge.event_room(), room);
    assert_eq!(bridge.event_code(), error_codes::UNREPRESENTABLE_VALUE);
    assert!(bridge.event_message().contains("blob"));
    assert_eq!(bridge.poll_event(), EventKind::None);
}
