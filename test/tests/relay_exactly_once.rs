/// Every started join-style operation reports exactly one terminal outcome,
/// whichever order the library completion and the host's release arrive in.

use std::thread;

use serde_json::json;

use roomlink_client::{error_codes, CallbackBridge, EventKind, Handle, Lifecycle, PollBridge};
use roomlink_test::{init_logging, CallbackLog, ScriptedLibrary};

fn drain(bridge: &mut PollBridge) -> Vec<(EventKind, Handle, i32, String)> {
    let mut events = Vec::new();
    loop {
        let kind = bridge.poll_event();
        if kind == EventKind::None {
            return events;
        }
        events.push((
            kind,
            bridge.event_room(),
            bridge.event_code(),
            bridge.event_message().to_string(),
        ));
    }
}

#[test]
fn poll_join_reports_once() {
    init_logging();
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let client = bridge.create_client("localhost:2567", false);

    let room = bridge.join_or_create(client, "lobby", "");
    assert_eq!(bridge.lifecycle(room), Some(Lifecycle::Pending));
    assert!(drain(&mut bridge).is_empty());

    library.join_next("abc", "xyz", "lobby");
    let events = drain(&mut bridge);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EventKind::RoomJoin);
    assert_eq!(events[0].1, room);
    assert_eq!(bridge.lifecycle(room), Some(Lifecycle::Joined));
}

#[test]
fn poll_release_before_resolve_reports_handle_released() {
    init_logging();
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let client = bridge.create_client("localhost:2567", false);

    let room = bridge.join(client, "lobby", "");
    bridge.free(room);
    assert_eq!(bridge.lifecycle(room), None);

    let late = library.join_next("abc", "xyz", "lobby");
    let events = drain(&mut bridge);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EventKind::ClientError);
    assert_eq!(events[0].1, room);
    assert_eq!(events[0].2, error_codes::HANDLE_RELEASED);

    // the orphaned room is left rather than leaked
    assert_eq!(late.leaves().len(), 1);
    assert_eq!(bridge.room_id(room), "");
}

#[test]
fn poll_remote_failure_releases_the_handle() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let client = bridge.create_client("localhost:2567", false);

    let room = bridge.join(client, "full_room", "");
    library.fail_next(4212, "room is full");

    let events = drain(&mut bridge);
    assert_eq!(events, vec![(EventKind::ClientError, room, 4212, "room is full".to_string())]);
    assert_eq!(bridge.lifecycle(room), None);
    assert!(!bridge.has_joined(room));
}

#[test]
fn poll_invalid_client_returns_none_without_an_event() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());

    let room = bridge.join_or_create(Handle::from(42), "lobby", "");
    assert!(room.is_none());
    assert_eq!(library.pending_len(), 0);
    assert!(drain(&mut bridge).is_empty());
}

#[test]
fn poll_invalid_options_fail_once_with_a_handle() {
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let client = bridge.create_client("localhost:2567", false);

    let room = bridge.create(client, "lobby", "{broken");
    assert!(!room.is_none());
    assert_eq!(library.pending_len(), 0);

    let events = drain(&mut bridge);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, EventKind::ClientError);
    assert_eq!(events[0].1, room);
    assert_eq!(events[0].2, error_codes::INVALID_OPTIONS);
}

#[test]
fn completion_from_another_thread_reports_once() {
    init_logging();
    let library = ScriptedLibrary::new();
    let mut bridge = PollBridge::new(library.clone());
    let client = bridge.create_client("localhost:2567", false);

    let rooms: Vec<Handle> = (0..8)
        .map(|index| bridge.join(client, &format!("room_{}", index), ""))
        .collect();

    let worker = {
        let library = library.clone();
        thread::spawn(move || {
            let mut index = 0;
            while let Some(pending) = library.take_pending() {
                if index % 2 == 0 {
                    pending.succeed(roomlink_test::ScriptedRoom::new(
                        &format!("id_{}", index),
                        "session",
                        "room",
                    ));
                } else {
                    pending.fail(500, "no capacity");
                }
                index += 1;
            }
        })
    };
    worker.join().unwrap();

    let events = drain(&mut bridge);
    assert_eq!(events.len(), rooms.len());
    for room in &rooms {
        assert_eq!(events.iter().filter(|event| event.1 == *room).count(), 1);
    }
    let joined = events.iter().filter(|event| event.0 == EventKind::RoomJoin).count();
    assert_eq!(joined, 4);
}

#[test]
fn callback_join_invokes_exactly_one_callback() {
    let library = ScriptedLibrary::new();
    let bridge = CallbackBridge::new(library.clone());
    let log = CallbackLog::new();
    let client = bridge.create_client("localhost:2567", false);

    let room = bridge.join_or_create(client, "lobby", "{}", log.outcome());
    assert!(log.is_empty());

    library.join_next("abc", "xyz", "lobby");
    let calls = log.drain(&bridge);
    assert_eq!(
        calls,
        vec![(
            "success".to_string(),
            json!({
                "error": false,
                "handle": room.value(),
                "id": "abc",
                "sessionId": "xyz",
                "name": "lobby",
            })
        )]
    );
    assert_eq!(bridge.pending_results(), 0);
}

#[test]
fn callback_release_before_resolve_invokes_on_error() {
    let library = ScriptedLibrary::new();
    let bridge = CallbackBridge::new(library.clone());
    let log = CallbackLog::new();
    let client = bridge.create_client("localhost:2567", false);

    let room = bridge.join(client, "lobby", "", log.outcome());
    bridge.dispose_room(room);
    library.join_next("abc", "xyz", "lobby");

    let calls = log.drain(&bridge);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "error");
    assert_eq!(calls[0].1["error"], json!(true));
    assert_eq!(calls[0].1["code"], json!(error_codes::HANDLE_RELEASED));
}

#[test]
fn callback_invalid_client_invokes_on_error() {
    let library = ScriptedLibrary::new();
    let bridge = CallbackBridge::new(library.clone());
    let log = CallbackLog::new();

    let room = bridge.join(Handle::from(99), "lobby", "", log.outcome());
    assert!(room.is_none());

    let calls = log.drain(&bridge);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "error");
    assert_eq!(calls[0].1["code"], json!(error_codes::INVALID_HANDLE));
}

#[test]
fn disposing_the_client_fails_its_pending_joins() {
    let library = ScriptedLibrary::new();
    let bridge = CallbackBridge::new(library.clone());
    let log = CallbackLog::new();
    let client = bridge.create_client("localhost:2567", false);

    bridge.join(client, "a", "", log.outcome());
    bridge.join(client, "b", "", log.outcome());
    bridge.dispose_client(client);

    library.join_next("a1", "s", "a");
    library.fail_next(500, "gone");

    assert_eq!(log.labels(), vec!["error".to_string(), "error".to_string()]);
    let calls = log.drain(&bridge);
    assert_eq!(calls[0].1["code"], json!(error_codes::HANDLE_RELEASED));
    assert_eq!(calls[1].1["code"], json!(error_codes::HANDLE_RELEASED));
}

#[test]
fn results_are_read_once() {
    let library = ScriptedLibrary::new();
    let bridge = CallbackBridge::new(library.clone());
    let log = CallbackLog::new();
    let client = bridge.create_client("localhost:2567", false);

    bridge.join(client, "lobby", "", log.outcome());
    library.fail_next(500, "nope");

    assert_eq!(bridge.pending_results(), 1);
    let calls = log.drain(&bridge);
    assert_eq!(calls[0].1["message"], json!("nope"));
    assert_eq!(bridge.pending_results(), 0);
    assert_eq!(bridge.get_result(roomlink_client::ResultId::from(1)), "null");
}
