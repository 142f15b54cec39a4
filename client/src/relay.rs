use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use log::{debug, info, trace, warn};
use serde_json::Value;

use roomlink_shared::{
    error_codes, BridgeError, ChangeBatch, Handle, HandleTable, JoinedOutcome, Outcome, RefId,
    ResultId, StatusCode, CLOSE_CONSENTED, CLOSE_NORMAL,
};

use crate::{
    resource::{ConnectionRecord, HostCallback, Lifecycle, Resource, ResourceTable, SessionRecord},
    session::{
        JoinRequest, MessageData, MessageType, RemoteError, RoomConnection, RoomEvent,
        SendPayload, SessionLibrary,
    },
    BridgeConfig, Endpoint,
};

/// A room event after the bridge has done its own bookkeeping.
pub(crate) enum RoomNotice {
    StateReplaced(Value),
    Mutations {
        batch: ChangeBatch,
        /// Renderings of the references the batch removed
        removed: HashMap<RefId, Value>,
    },
    Message {
        kind: MessageType,
        data: MessageData,
    },
    Error {
        code: StatusCode,
        message: String,
    },
    Leave {
        code: StatusCode,
        reason: String,
    },
}

/// Work collected under the state lock and run after it is released, so host
/// callbacks and library calls are free to re-enter the bridge.
#[derive(Default)]
pub(crate) struct Deferred {
    calls: Vec<(HostCallback, ResultId)>,
    leaves: Vec<(Handle, Arc<dyn RoomConnection>, bool)>,
}

impl Deferred {
    pub fn call(&mut self, callback: HostCallback, result: ResultId) {
        self.calls.push((callback, result));
    }

    pub fn leave(&mut self, handle: Handle, room: Arc<dyn RoomConnection>, consented: bool) {
        self.leaves.push((handle, room, consented));
    }

    pub fn run(self) {
        for (callback, result) in self.calls {
            callback(result);
        }
        for (handle, room, consented) in self.leaves {
            if !room.is_open() {
                continue;
            }
            if let Err(err) = room.leave(consented) {
                warn!("Best-effort disconnect of room {} failed: {}", handle, err);
            }
        }
    }
}

/// How a bridge personality hands outcomes and room events to its host.
pub(crate) trait Delivery: Send + 'static {
    /// Per-operation state carried from the call that started it to its outcome
    type Continuation: Send + 'static;

    /// Delivers the one terminal outcome of a started operation.
    fn settle(
        &mut self,
        handle: Handle,
        outcome: Outcome,
        continuation: Self::Continuation,
        deferred: &mut Deferred,
    );

    /// Answers a call that never started an operation, e.g. on an unknown
    /// client handle.
    fn reject(
        &mut self,
        outcome: Outcome,
        continuation: Self::Continuation,
        deferred: &mut Deferred,
    );

    fn room_event(
        &mut self,
        handle: Handle,
        notice: RoomNotice,
        handles: &HandleTable<Resource>,
        deferred: &mut Deferred,
    );

    fn send_failed(
        &mut self,
        handle: Handle,
        error: &BridgeError,
        handles: &HandleTable<Resource>,
        deferred: &mut Deferred,
    );
}

pub(crate) struct BridgeState<D: Delivery> {
    pub config: BridgeConfig,
    pub handles: HandleTable<Resource>,
    pub delivery: D,
}

impl<D: Delivery> BridgeState<D> {
    /// Releases `handle` and everything it owns. Open rooms are queued for a
    /// best-effort disconnect.
    fn release(&mut self, handle: Handle, deferred: &mut Deferred) {
        let was_pending = self.handles.is_reserved(&handle);
        match self.handles.release(&handle) {
            None if was_pending => {
                debug!("Released pending handle {}", handle);
            }
            None => {
                trace!("Release of unknown handle {} ignored", handle);
            }
            Some(Resource::Session(session)) => {
                info!("Disposing client {} ({})", handle, session.endpoint);
                for connection in session.connections {
                    self.release(connection, deferred);
                }
            }
            Some(Resource::Connection(connection)) => {
                info!("Disposing room {} ({})", handle, connection.id);
                for listener in &connection.listeners {
                    self.handles.release(listener);
                }
                self.detach_from_session(connection.client, handle);
                if connection.lifecycle == Lifecycle::Joined {
                    deferred.leave(
                        handle,
                        connection.room,
                        self.config.release_disconnect_consented,
                    );
                }
            }
            Some(Resource::Listener(listener)) => {
                if let Ok(connection) = self.handles.connection_mut(&listener.connection) {
                    connection.listeners.retain(|other| *other != handle);
                }
            }
        }
    }

    fn detach_from_session(&mut self, client: Handle, connection: Handle) {
        if let Ok(session) = self.handles.session_mut(&client) {
            session.connections.retain(|other| *other != connection);
        }
    }
}

fn lock_state<D: Delivery>(state: &Mutex<BridgeState<D>>) -> MutexGuard<'_, BridgeState<D>> {
    state.lock().unwrap_or_else(|poisoned| {
        warn!("Bridge state lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// The async completion relay. Owns the handle table and routes every
/// outcome and room event through one `Delivery`.
pub(crate) struct BridgeCore<D: Delivery> {
    library: Arc<dyn SessionLibrary>,
    state: Arc<Mutex<BridgeState<D>>>,
}

impl<D: Delivery> BridgeCore<D> {
    pub fn new(library: Arc<dyn SessionLibrary>, config: BridgeConfig, delivery: D) -> Self {
        Self {
            library,
            state: Arc::new(Mutex::new(BridgeState {
                config,
                handles: HandleTable::new(),
                delivery,
            })),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, BridgeState<D>> {
        lock_state(&self.state)
    }

    pub fn config(&self) -> BridgeConfig {
        self.lock().config.clone()
    }

    pub fn join_options(&self, options: &str) -> Result<Value, serde_json::Error> {
        self.lock().config.join_options(options)
    }

    pub fn create_client(&self, endpoint: &str, secure: bool) -> Handle {
        let endpoint = match Endpoint::parse(endpoint, secure) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                warn!("Client not created: {}", err);
                return Handle::NONE;
            }
        };

        let session = match self.library.connect(&endpoint) {
            Ok(session) => session,
            Err(err) => {
                warn!("Client for {} not created: {}", endpoint, err);
                return Handle::NONE;
            }
        };

        let handle = self.lock().handles.insert(Resource::Session(SessionRecord {
            endpoint: endpoint.clone(),
            session,
            connections: Vec::new(),
        }));
        info!("Created client {} for {}", handle, endpoint);
        handle
    }

    pub fn endpoint(&self, client: Handle) -> Option<Endpoint> {
        let state = self.lock();
        state
            .handles
            .session(&client)
            .ok()
            .map(|session| session.endpoint.clone())
    }

    /// Starts a join-style operation. The returned handle is reserved before
    /// the library is called and resolves once the join succeeds. Exactly
    /// one outcome is delivered for it, however and whenever the library
    /// completes.
    pub fn start(
        &self,
        client: Handle,
        request: JoinRequest,
        continuation: D::Continuation,
    ) -> Handle {
        let operation = request.operation();

        let started = {
            let mut state = self.lock();
            match state.handles.session(&client).map(|record| record.session.clone()) {
                Ok(session) => {
                    let handle = state.handles.allocate();
                    if let Ok(record) = state.handles.session_mut(&client) {
                        record.connections.push(handle);
                    }
                    Some((handle, session))
                }
                Err(err) => {
                    debug!("{} on client {} refused: {}", operation, client, err);
                    None
                }
            }
        };

        let Some((handle, session)) = started else {
            self.reject(continuation);
            return Handle::NONE;
        };

        debug!("{} '{}' started as {}", operation, request.target(), handle);
        let weak = Arc::downgrade(&self.state);
        session.matchmake(
            request,
            Box::new(move |result| {
                Self::complete(weak, handle, client, operation, result, continuation)
            }),
        );
        handle
    }

    fn reject(&self, continuation: D::Continuation) {
        let mut deferred = Deferred::default();
        self.lock().delivery.reject(
            Outcome::failed(error_codes::INVALID_HANDLE, "Client not found"),
            continuation,
            &mut deferred,
        );
        deferred.run();
    }

    /// Starts an operation that has already failed, e.g. on unparseable
    /// options. The host still gets a handle and exactly one outcome.
    pub fn start_failed(
        &self,
        client: Handle,
        code: StatusCode,
        message: String,
        continuation: D::Continuation,
    ) -> Handle {
        let mut deferred = Deferred::default();
        let handle = {
            let mut state = self.lock();
            if state.handles.session(&client).is_err() {
                state.delivery.reject(
                    Outcome::failed(error_codes::INVALID_HANDLE, "Client not found"),
                    continuation,
                    &mut deferred,
                );
                Handle::NONE
            } else {
                let handle = state.handles.allocate();
                state.handles.release(&handle);
                state
                    .delivery
                    .settle(handle, Outcome::failed(code, message), continuation, &mut deferred);
                handle
            }
        };
        deferred.run();
        handle
    }

    fn complete(
        weak: Weak<Mutex<BridgeState<D>>>,
        handle: Handle,
        client: Handle,
        operation: &'static str,
        result: Result<Arc<dyn RoomConnection>, RemoteError>,
        continuation: D::Continuation,
    ) {
        let Some(state) = weak.upgrade() else {
            if let Ok(room) = result {
                if let Err(err) = room.leave(true) {
                    warn!("Best-effort disconnect of orphaned room failed: {}", err);
                }
            }
            return;
        };

        let mut deferred = Deferred::default();
        let bound = {
            let mut guard = lock_state(&state);
            Self::bind(&mut guard, handle, client, operation, result, &mut deferred)
        };

        // Subscribe before the host hears about the room. Events arriving
        // until the outcome is delivered are held on the connection.
        let outcome = match bound {
            Ok((joined, room)) => {
                let weak = Arc::downgrade(&state);
                room.subscribe(Box::new(move |event| {
                    Self::on_room_event(&weak, handle, event)
                }));
                Outcome::Joined(joined)
            }
            Err(outcome) => outcome,
        };

        {
            let mut guard = lock_state(&state);
            let state = &mut *guard;

            let outcome = match outcome {
                Outcome::Joined(_) if state.handles.connection(&handle).is_err() => {
                    warn!("Room {} was released before its join was delivered", handle);
                    Outcome::failed(
                        error_codes::HANDLE_RELEASED,
                        "Handle released before the operation resolved",
                    )
                }
                outcome => outcome,
            };
            if outcome.is_error() {
                state.detach_from_session(client, handle);
            }
            state
                .delivery
                .settle(handle, outcome, continuation, &mut deferred);

            let held = match state.handles.connection_mut(&handle) {
                Ok(connection) => {
                    connection.delivered = true;
                    std::mem::take(&mut connection.held)
                }
                Err(_) => Vec::new(),
            };
            for event in held {
                Self::route_event(state, handle, event, &mut deferred);
            }
        }
        deferred.run();
    }

    /// Binds a successful join to its reserved handle. Anything else becomes
    /// the failure outcome to deliver.
    fn bind(
        state: &mut BridgeState<D>,
        handle: Handle,
        client: Handle,
        operation: &'static str,
        result: Result<Arc<dyn RoomConnection>, RemoteError>,
        deferred: &mut Deferred,
    ) -> Result<(JoinedOutcome, Arc<dyn RoomConnection>), Outcome> {
        let consented = state.config.release_disconnect_consented;

        if !state.handles.is_reserved(&handle) {
            warn!(
                "{} for handle {} resolved after the handle was released",
                operation, handle
            );
            if let Ok(room) = result {
                deferred.leave(handle, room, consented);
            }
            return Err(Outcome::failed(
                error_codes::HANDLE_RELEASED,
                "Handle released before the operation resolved",
            ));
        }

        let room = match result {
            Ok(room) => room,
            Err(remote) => {
                let error = BridgeError::ConnectionFailure {
                    code: remote.code,
                    message: remote.message,
                };
                info!("{} for handle {} failed: {}", operation, handle, error);
                state.handles.release(&handle);
                return Err(Outcome::from_error(&error));
            }
        };

        let joined = JoinedOutcome {
            handle,
            id: room.id(),
            session_id: room.session_id(),
            name: room.name(),
        };
        let record = ConnectionRecord::new(
            client,
            room.clone(),
            joined.id.clone(),
            joined.session_id.clone(),
            joined.name.clone(),
        );
        match state.handles.bind(handle, Resource::Connection(record)) {
            Ok(()) => {
                info!(
                    "Joined room {} as {} ({}, session {})",
                    joined.name, handle, joined.id, joined.session_id
                );
                Ok((joined, room))
            }
            Err(err) => {
                warn!(
                    "{} for handle {} could not bind: {}",
                    operation, handle, err
                );
                deferred.leave(handle, room, consented);
                Err(Outcome::failed(error_codes::HANDLE_RELEASED, err.to_string()))
            }
        }
    }

    fn on_room_event(weak: &Weak<Mutex<BridgeState<D>>>, handle: Handle, event: RoomEvent) {
        let Some(state) = weak.upgrade() else {
            return;
        };

        let mut deferred = Deferred::default();
        {
            let mut guard = lock_state(&state);
            let state = &mut *guard;
            match state.handles.connection_mut(&handle) {
                Ok(connection) if !connection.delivered => {
                    trace!("Room {} event held until its join is delivered", handle);
                    connection.held.push(event);
                    return;
                }
                Ok(_) => {}
                Err(_) => {
                    trace!("Event for released room {} dropped", handle);
                    return;
                }
            }
            Self::route_event(state, handle, event, &mut deferred);
        }
        deferred.run();
    }

    fn route_event(
        state: &mut BridgeState<D>,
        handle: Handle,
        event: RoomEvent,
        deferred: &mut Deferred,
    ) {
        let Ok(connection) = state.handles.connection_mut(&handle) else {
            return;
        };

        let mut drift = Vec::new();
        let notice = match event {
            RoomEvent::StateReplaced(value) => {
                trace!("Room {} state replaced", handle);
                connection.snapshot = value.clone();
                RoomNotice::StateReplaced(value)
            }
            RoomEvent::StateChanged(changes) => {
                let batch = ChangeBatch::serialize(&changes, &mut connection.entities);
                let removed = connection.apply_batch(&batch);
                trace!("Room {} mutated by {} changes", handle, batch.len());
                drift.extend(batch.unrepresentable());
                RoomNotice::Mutations { batch, removed }
            }
            RoomEvent::Message { kind, data } => {
                trace!("Room {} message {:?}", handle, kind);
                RoomNotice::Message { kind, data }
            }
            RoomEvent::Error { code, message } => {
                warn!("Room {} error ({}): {}", handle, code, message);
                RoomNotice::Error { code, message }
            }
            RoomEvent::Leave { code, reason } => {
                connection.lifecycle = if code == CLOSE_NORMAL || code == CLOSE_CONSENTED {
                    Lifecycle::Left
                } else {
                    Lifecycle::Failed
                };
                info!("Left room {} ({}): {:?}", handle, code, connection.lifecycle);
                RoomNotice::Leave { code, reason }
            }
        };

        state
            .delivery
            .room_event(handle, notice, &state.handles, deferred);

        // drift reports follow the batch they came with
        for error in drift {
            let notice = RoomNotice::Error {
                code: error.code(),
                message: error.to_string(),
            };
            state
                .delivery
                .room_event(handle, notice, &state.handles, deferred);
        }
    }

    pub fn send(&self, handle: Handle, kind: MessageType, payload: SendPayload) -> bool {
        let room = {
            let state = self.lock();
            match state.handles.connection(&handle) {
                Ok(connection) if connection.lifecycle == Lifecycle::Joined => {
                    Ok(connection.room.clone())
                }
                Ok(connection) => Err(format!("room is {:?}", connection.lifecycle)),
                Err(err) => {
                    debug!("Send on {} ignored: {}", handle, err);
                    return false;
                }
            }
        };

        let result = match room {
            Ok(room) if room.is_open() => room.send(&kind, payload).map_err(|err| err.to_string()),
            Ok(_) => Err("connection is closed".to_string()),
            Err(reason) => Err(reason),
        };

        match result {
            Ok(()) => true,
            Err(reason) => {
                self.send_failed(handle, reason);
                false
            }
        }
    }

    /// Surfaces a send failure on `handle` through the delivery channel.
    pub fn send_failed(&self, handle: Handle, reason: String) {
        let error = BridgeError::SendFailure { handle, reason };
        warn!("{}", error);
        let mut deferred = Deferred::default();
        {
            let mut guard = self.lock();
            let state = &mut *guard;
            state
                .delivery
                .send_failed(handle, &error, &state.handles, &mut deferred);
        }
        deferred.run();
    }

    /// Asks the library to leave the room. The handle stays valid until released.
    pub fn leave(&self, handle: Handle, consented: bool) -> bool {
        let room = match self.lock().handles.connection(&handle) {
            Ok(connection) => connection.room.clone(),
            Err(err) => {
                debug!("Leave on {} ignored: {}", handle, err);
                return false;
            }
        };
        match room.leave(consented) {
            Ok(()) => true,
            Err(err) => {
                warn!("Leave of room {} failed: {}", handle, err);
                false
            }
        }
    }

    /// Releases any handle. Unknown and already released handles are ignored.
    pub fn release(&self, handle: Handle) {
        let mut deferred = Deferred::default();
        self.lock().release(handle, &mut deferred);
        deferred.run();
    }

    pub fn lifecycle(&self, handle: Handle) -> Option<Lifecycle> {
        let state = self.lock();
        if state.handles.is_reserved(&handle) {
            return Some(Lifecycle::Pending);
        }
        state
            .handles
            .connection(&handle)
            .ok()
            .map(|connection| connection.lifecycle)
    }

    pub fn with_connection<T>(
        &self,
        handle: Handle,
        f: impl FnOnce(&ConnectionRecord) -> T,
    ) -> Option<T> {
        let state = self.lock();
        state.handles.connection(&handle).ok().map(f)
    }

    pub fn has_joined(&self, handle: Handle) -> bool {
        let room = self.with_connection(handle, |connection| {
            (connection.lifecycle == Lifecycle::Joined).then(|| connection.room.clone())
        });
        matches!(room, Some(Some(room)) if room.is_open())
    }

    pub fn reconnection_token(&self, handle: Handle) -> Option<String> {
        let room = self.with_connection(handle, |connection| connection.room.clone())?;
        room.reconnection_token()
    }
}
