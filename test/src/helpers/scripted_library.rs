/// In-memory session library for bridge tests.
/// Join requests are parked until the test resolves them, from the test
/// thread or any other.
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use roomlink_client::{
    Endpoint, JoinCompletion, JoinRequest, RemoteError, RoomConnection, Session, SessionLibrary,
    StatusCode, TransportError,
};

use crate::ScriptedRoom;

/// A join request the bridge handed to the library, not yet resolved.
pub struct PendingJoin {
    pub request: JoinRequest,
    completion: JoinCompletion,
}

impl PendingJoin {
    pub fn succeed(self, room: Arc<ScriptedRoom>) {
        let room: Arc<dyn RoomConnection> = room;
        (self.completion)(Ok(room));
    }

    pub fn fail(self, code: StatusCode, message: &str) {
        (self.completion)(Err(RemoteError::new(code, message)));
    }
}

#[derive(Default)]
struct Script {
    endpoints: Vec<Endpoint>,
    pending: VecDeque<PendingJoin>,
}

#[derive(Default)]
pub struct ScriptedLibrary {
    script: Arc<Mutex<Script>>,
    refuse_connections: AtomicBool,
}

impl ScriptedLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Endpoints of every session opened so far.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.script.lock().unwrap().endpoints.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.script.lock().unwrap().pending.len()
    }

    /// Oldest unresolved join request.
    pub fn take_pending(&self) -> Option<PendingJoin> {
        self.script.lock().unwrap().pending.pop_front()
    }

    /// Resolves the oldest join request with a fresh room and returns it.
    pub fn join_next(&self, id: &str, session_id: &str, name: &str) -> Arc<ScriptedRoom> {
        let pending = self.take_pending().expect("no pending join");
        let room = ScriptedRoom::new(id, session_id, name);
        pending.succeed(room.clone());
        room
    }

    pub fn fail_next(&self, code: StatusCode, message: &str) {
        self.take_pending()
            .expect("no pending join")
            .fail(code, message);
    }
}

impl SessionLibrary for ScriptedLibrary {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Session>, TransportError> {
        if self.refuse_connections.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected {
                reason: "connections refused by script".to_string(),
            });
        }
        self.script.lock().unwrap().endpoints.push(endpoint.clone());
        Ok(Arc::new(ScriptedSession {
            script: self.script.clone(),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Mutex<Script>>,
}

impl Session for ScriptedSession {
    fn matchmake(&self, request: JoinRequest, completion: JoinCompletion) {
        self.script
            .lock()
            .unwrap()
            .pending
            .push_back(PendingJoin {
                request,
                completion,
            });
    }
}
