/// End-to-end flow through the callback bridge: room hooks, listeners, raw
/// change batches and the replicated state view.

use std::sync::Arc;

use serde_json::{json, Value};

use roomlink_client::{
    error_codes, BridgeError, CallbackBridge, ChangeBatch, DataChange, DecodedValue, Handle,
    HostCallback, Lifecycle, MessageType, Operation, OutcomeCallbacks, SendPayload,
};
use roomlink_shared::MirrorState;
use roomlink_test::{init_logging, CallbackLog, ScriptedLibrary, ScriptedRoom};

fn joined(library: &Arc<ScriptedLibrary>) -> (CallbackBridge, Handle, Arc<ScriptedRoom>) {
    init_logging();
    let bridge = CallbackBridge::new(library.clone());
    let client = bridge.create_client("localhost:2567", false);
    let outcome = CallbackLog::new();
    let room = bridge.join(client, "lobby", "", outcome.outcome());
    let scripted = library.join_next("abc", "xyz", "lobby");
    assert_eq!(outcome.labels(), vec!["success".to_string()]);
    outcome.drain(&bridge);
    (bridge, room, scripted)
}

fn add_alice() -> Vec<DataChange> {
    vec![
        DataChange::field(0, Operation::ADD, "players", DecodedValue::Node { ref_id: 1 }),
        DataChange::entry(1, Operation::ADD, "alice", DecodedValue::Node { ref_id: 2 }),
        DataChange::field(2, Operation::ADD, "hp", DecodedValue::Integer(10)),
    ]
}

fn remove_alice() -> Vec<DataChange> {
    vec![DataChange::entry(1, Operation::DELETE, "alice", DecodedValue::Undefined)
        .with_previous(DecodedValue::Node { ref_id: 2 })]
}

#[test]
fn room_hooks_receive_json_payloads() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();

    assert!(bridge.set_on_state_change(room, log.callback("state")));
    assert!(bridge.set_on_message(room, log.callback("message")));
    assert!(bridge.set_on_error(room, log.callback("error")));
    assert!(bridge.set_on_leave(room, log.callback("leave")));
    assert!(!bridge.set_on_message(Handle::from(77), log.callback("message")));

    scripted.replace_state(json!({"round": 1}));
    scripted.message("chat", json!({"text": "hi"}));
    scripted.error(4001, "bad move");
    scripted.close(1000, "bye");

    assert_eq!(
        log.drain(&bridge),
        vec![
            ("state".to_string(), json!({"round": 1})),
            ("message".to_string(), json!({"type": "chat", "data": {"text": "hi"}})),
            ("error".to_string(), json!({"code": 4001, "message": "bad move"})),
            ("leave".to_string(), json!({"code": 1000})),
        ]
    );
    assert_eq!(bridge.lifecycle(room), Some(Lifecycle::Left));
}

#[test]
fn state_view_prefers_the_mirror_once_mutations_arrive() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);

    assert_eq!(bridge.get_state(room), "{}");
    scripted.replace_state(json!({"round": 1}));
    assert_eq!(
        serde_json::from_str::<Value>(&bridge.get_state(room)).unwrap(),
        json!({"round": 1})
    );

    scripted.change(add_alice());
    assert_eq!(
        serde_json::from_str::<Value>(&bridge.get_state(room)).unwrap(),
        json!({"players": {"alice": {"hp": 10}}})
    );
    assert_eq!(bridge.get_state(Handle::from(999)), "{}");
}

#[test]
fn listeners_fire_after_the_batch_in_record_order() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();

    bridge.setup_raw_changes(room, log.callback("raw"));
    bridge.on_add(room, "players", log.callback("add")).unwrap();
    bridge.listen(room, "players.alice.hp", log.callback("hp")).unwrap();

    scripted.change(add_alice());
    let calls = log.drain(&bridge);
    let labels: Vec<_> = calls.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(labels, vec!["raw", "add", "hp"]);

    let raw = ChangeBatch::from_json(&calls[0].1.to_string()).unwrap();
    assert_eq!(raw.len(), 3);
    assert_eq!(calls[1].1, json!({"item": {"hp": 10}, "key": "alice", "refId": 2}));
    assert_eq!(calls[2].1, json!({"current": 10, "previous": null}));

    scripted.change(vec![DataChange::field(2, Operation::REPLACE, "hp", DecodedValue::Integer(7))
        .with_previous(DecodedValue::Integer(10))]);
    assert_eq!(
        log.drain_label(&bridge, "hp"),
        vec![json!({"current": 7, "previous": 10})]
    );
}

#[test]
fn on_remove_reports_the_item_as_it_was() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();

    scripted.change(add_alice());
    bridge.on_remove(room, "players", log.callback("remove")).unwrap();
    bridge.listen_entity(room, 2, "hp", log.callback("hp")).unwrap();

    scripted.change(remove_alice());
    assert_eq!(
        log.drain(&bridge),
        vec![(
            "remove".to_string(),
            json!({"item": {"hp": 10}, "key": "alice", "refId": 2})
        )]
    );
    assert_eq!(
        serde_json::from_str::<Value>(&bridge.get_state(room)).unwrap(),
        json!({"players": {}})
    );
}

#[test]
fn listening_on_a_removed_entity_fails() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();

    scripted.change(add_alice());
    assert!(bridge.listen_entity(room, 2, "hp", log.callback("hp")).is_ok());

    scripted.change(remove_alice());
    let error = bridge
        .listen_entity(room, 2, "hp", log.callback("hp"))
        .unwrap_err();
    assert!(matches!(error, BridgeError::ListenerAttachFailure { .. }));
    assert_eq!(error.code(), error_codes::LISTENER_ATTACH_FAILURE);
}

#[test]
fn listener_attach_checks_the_room() {
    let library = ScriptedLibrary::new();
    let (bridge, room, _scripted) = joined(&library);
    let log = CallbackLog::new();

    let error = bridge
        .listen(Handle::from(999), "round", log.callback("round"))
        .unwrap_err();
    assert_eq!(error.code(), error_codes::INVALID_HANDLE);

    let error = bridge.listen(room, "", log.callback("round")).unwrap_err();
    assert!(matches!(error, BridgeError::ListenerAttachFailure { .. }));

    assert!(bridge.leave(room, true));
    let error = bridge.listen(room, "round", log.callback("round")).unwrap_err();
    assert!(matches!(error, BridgeError::ListenerAttachFailure { .. }));
}

#[test]
fn removed_listeners_stop_firing() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();

    let listener = bridge.listen(room, "round", log.callback("round")).unwrap();
    scripted.change(vec![DataChange::field(0, Operation::ADD, "round", DecodedValue::Integer(1))]);
    assert_eq!(log.len(), 1);

    assert!(bridge.remove_listener(listener));
    assert!(!bridge.remove_listener(listener));
    assert!(!bridge.remove_listener(room));

    scripted.change(vec![DataChange::field(0, Operation::REPLACE, "round", DecodedValue::Integer(2))
        .with_previous(DecodedValue::Integer(1))]);
    assert_eq!(log.len(), 1);
}

#[test]
fn sends_parse_json_payloads() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();
    bridge.set_on_error(room, log.callback("error"));

    assert!(bridge.send(room, "move", r#"{"x": 1}"#));
    assert!(bridge.send(room, "ping", ""));
    assert!(bridge.send_int(room, 3, "null"));
    assert!(!bridge.send(room, "move", "{broken"));

    assert_eq!(
        scripted.sent(),
        vec![
            (MessageType::Name("move".to_string()), SendPayload::Json(json!({"x": 1}))),
            (MessageType::Name("ping".to_string()), SendPayload::Empty),
            (MessageType::Code(3), SendPayload::Empty),
        ]
    );
    let errors = log.drain_label(&bridge, "error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], json!(error_codes::SEND_FAILURE));
}

#[test]
fn disposing_a_room_leaves_it_and_drops_its_listeners() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();

    let listener = bridge.listen(room, "round", log.callback("round")).unwrap();
    bridge.dispose_room(room);

    assert_eq!(scripted.leaves(), vec![true]);
    assert!(!bridge.remove_listener(listener));
    assert_eq!(bridge.lifecycle(room), None);
    assert_eq!(bridge.room_id(room), "");

    scripted.change(vec![DataChange::field(0, Operation::ADD, "round", DecodedValue::Integer(1))]);
    assert!(log.is_empty());
}

#[test]
fn mirror_rebuilt_from_raw_batches_matches_the_state_view() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();
    bridge.setup_raw_changes(room, log.callback("raw"));

    scripted.change(add_alice());
    scripted.change(vec![
        DataChange::entry(1, Operation::ADD, "bob", DecodedValue::Node { ref_id: 3 }),
        DataChange::field(3, Operation::ADD, "hp", DecodedValue::Integer(4)),
        DataChange::field(0, Operation::ADD, "round", DecodedValue::Integer(2)),
    ]);
    scripted.change(remove_alice());

    let mut mirror = MirrorState::new();
    for payload in log.drain_label(&bridge, "raw") {
        let batch = ChangeBatch::from_json(&payload.to_string()).unwrap();
        mirror.apply_batch(&batch);
    }

    let state: Value = serde_json::from_str(&bridge.get_state(room)).unwrap();
    assert_eq!(mirror.root_json(), state);
    assert_eq!(state, json!({"players": {"bob": {"hp": 4}}, "round": 2}));
}

#[test]
fn entity_moved_between_collections_keeps_its_listeners() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();

    scripted.change(vec![
        DataChange::field(0, Operation::ADD, "bag", DecodedValue::Node { ref_id: 1 }),
        DataChange::field(0, Operation::ADD, "hands", DecodedValue::Node { ref_id: 2 }),
        DataChange::entry(1, Operation::ADD, "sword", DecodedValue::Node { ref_id: 5 }),
        DataChange::field(5, Operation::ADD, "hp", DecodedValue::Integer(3)),
    ]);
    scripted.change(vec![
        DataChange::entry(2, Operation::ADD, 0u32, DecodedValue::Node { ref_id: 5 }),
        DataChange::entry(1, Operation::DELETE, "sword", DecodedValue::Undefined)
            .with_previous(DecodedValue::Node { ref_id: 5 }),
    ]);
    assert_eq!(
        serde_json::from_str::<Value>(&bridge.get_state(room)).unwrap(),
        json!({"bag": {}, "hands": [{"hp": 3}]})
    );

    bridge.listen_entity(room, 5, "hp", log.callback("entity")).unwrap();
    bridge.listen(room, "hands.0.hp", log.callback("path")).unwrap();

    scripted.change(vec![DataChange::field(5, Operation::REPLACE, "hp", DecodedValue::Integer(4))
        .with_previous(DecodedValue::Integer(3))]);

    let hp = json!({"current": 4, "previous": 3});
    assert_eq!(
        log.drain(&bridge),
        vec![("entity".to_string(), hp.clone()), ("path".to_string(), hp)]
    );
}

#[test]
fn state_pushed_while_the_join_lands_reaches_hooks_set_on_success() {
    init_logging();
    let library = ScriptedLibrary::new();
    let bridge = Arc::new(CallbackBridge::new(library.clone()));
    let client = bridge.create_client("localhost:2567", false);
    let log = CallbackLog::new();
    let scripted = ScriptedRoom::new("abc", "xyz", "lobby");

    let on_success: HostCallback = {
        let bridge = bridge.clone();
        let scripted = scripted.clone();
        let log = log.clone();
        Arc::new(move |result| {
            let joined: Value = serde_json::from_str(&bridge.get_result(result)).unwrap();
            let room = Handle::from(joined["handle"].as_u64().unwrap());
            assert!(bridge.set_on_state_change(room, log.callback("state")));
            scripted.replace_state(json!({"round": 0}));
        })
    };
    let callbacks = OutcomeCallbacks::new(on_success, log.callback("error"));
    let room = bridge.join(client, "lobby", "", callbacks);
    library.take_pending().unwrap().succeed(scripted.clone());

    assert_eq!(log.drain(&bridge), vec![("state".to_string(), json!({"round": 0}))]);
    assert_eq!(bridge.lifecycle(room), Some(Lifecycle::Joined));
}

#[test]
fn unrepresentable_values_reach_the_error_hook() {
    let library = ScriptedLibrary::new();
    let (bridge, room, scripted) = joined(&library);
    let log = CallbackLog::new();
    bridge.set_on_error(room, log.callback("error"));
    bridge.setup_raw_changes(room, log.callback("raw"));

    scripted.change(vec![DataChange::field(
        0,
        Operation::ADD,
        "blob",
        DecodedValue::Opaque {
            type_name: "Float32Array".to_string(),
        },
    )]);

    assert_eq!(log.labels(), vec!["raw".to_string(), "error".to_string()]);
    let errors = log.drain_label(&bridge, "error");
    assert_eq!(errors[0]["code"], json!(error_codes::UNREPRESENTABLE_VALUE));
}
