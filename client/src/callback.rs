use std::{collections::HashMap, sync::Arc};

use log::{debug, warn};
use serde_json::{json, Value};

use roomlink_shared::{
    error_codes, BridgeError, ChangeBatch, Handle, HandleTable, Outcome, OutcomeStore, RefId,
    ResultId, ROOT_REF_ID,
};

use crate::{
    listener::{ListenerKind, ListenerSpec},
    relay::{BridgeCore, Deferred, Delivery, RoomNotice},
    resource::{
        ConnectionRecord, HostCallback, Lifecycle, ListenerRecord, Resource, ResourceTable,
        RoomHooks,
    },
    session::{JoinRequest, MessageType, SendPayload, SessionLibrary},
    BridgeConfig,
};

/// The success/failure pair a join-style call reports to.
#[derive(Clone)]
pub struct OutcomeCallbacks {
    pub on_success: HostCallback,
    pub on_error: HostCallback,
}

impl OutcomeCallbacks {
    pub fn new(on_success: HostCallback, on_error: HostCallback) -> Self {
        Self {
            on_success,
            on_error,
        }
    }
}

/// Delivers everything by storing a JSON payload under a one-time result id
/// and invoking a host callback with that id.
pub(crate) struct CallbackDelivery {
    results: OutcomeStore,
}

impl CallbackDelivery {
    fn notify(&mut self, hook: &Option<HostCallback>, payload: Value, deferred: &mut Deferred) {
        if let Some(callback) = hook {
            let result = self.results.store(payload.to_string());
            deferred.call(callback.clone(), result);
        }
    }

    fn dispatch_batch(
        &mut self,
        connection: &ConnectionRecord,
        batch: ChangeBatch,
        removed: HashMap<RefId, Value>,
        handles: &HandleTable<Resource>,
        deferred: &mut Deferred,
    ) {
        if batch.is_empty() {
            return;
        }

        if let Some(callback) = &connection.hooks.raw_changes {
            match batch.to_json() {
                Ok(json) => {
                    let result = self.results.store(json);
                    deferred.call(callback.clone(), result);
                }
                Err(err) => warn!("Raw changes for room {} not delivered: {}", connection.id, err),
            }
        }

        for record in &batch {
            for listener in connection
                .listeners
                .iter()
                .filter_map(|listener| handles.listener(listener).ok())
            {
                if !listener.spec.matches(record, &connection.entities) {
                    continue;
                }
                let payload = listener.spec.payload(record, &connection.mirror, &removed);
                let result = self.results.store(payload.to_string());
                deferred.call(listener.callback.clone(), result);
            }
        }
    }
}

impl Delivery for CallbackDelivery {
    type Continuation = OutcomeCallbacks;

    fn settle(
        &mut self,
        _: Handle,
        outcome: Outcome,
        callbacks: OutcomeCallbacks,
        deferred: &mut Deferred,
    ) {
        let result = self.results.store(outcome.to_json());
        let callback = if outcome.is_error() {
            callbacks.on_error
        } else {
            callbacks.on_success
        };
        deferred.call(callback, result);
    }

    fn reject(&mut self, outcome: Outcome, callbacks: OutcomeCallbacks, deferred: &mut Deferred) {
        self.settle(Handle::NONE, outcome, callbacks, deferred);
    }

    fn room_event(
        &mut self,
        handle: Handle,
        notice: RoomNotice,
        handles: &HandleTable<Resource>,
        deferred: &mut Deferred,
    ) {
        let Ok(connection) = handles.connection(&handle) else {
            return;
        };
        let hooks = &connection.hooks;
        match notice {
            RoomNotice::StateReplaced(state) => {
                self.notify(&hooks.on_state_change, state, deferred)
            }
            RoomNotice::Message { kind, data } => self.notify(
                &hooks.on_message,
                json!({ "type": kind.to_json(), "data": data.to_json() }),
                deferred,
            ),
            RoomNotice::Error { code, message } => self.notify(
                &hooks.on_error,
                json!({ "code": code, "message": message }),
                deferred,
            ),
            RoomNotice::Leave { code, .. } => {
                self.notify(&hooks.on_leave, json!({ "code": code }), deferred)
            }
            RoomNotice::Mutations { batch, removed } => {
                self.dispatch_batch(connection, batch, removed, handles, deferred)
            }
        }
    }

    fn send_failed(
        &mut self,
        handle: Handle,
        error: &BridgeError,
        handles: &HandleTable<Resource>,
        deferred: &mut Deferred,
    ) {
        let Ok(connection) = handles.connection(&handle) else {
            return;
        };
        self.notify(
            &connection.hooks.on_error,
            json!({ "code": error.code(), "message": error.to_string() }),
            deferred,
        );
    }
}

/// Bridge for hosts that register single-argument callbacks. Each callback
/// receives a result id; `get_result` hands out the JSON stored under it
/// exactly once.
pub struct CallbackBridge {
    core: BridgeCore<CallbackDelivery>,
}

impl CallbackBridge {
    pub fn new(library: Arc<dyn SessionLibrary>) -> Self {
        Self::with_config(library, BridgeConfig::default())
    }

    pub fn with_config(library: Arc<dyn SessionLibrary>, config: BridgeConfig) -> Self {
        let delivery = CallbackDelivery {
            results: OutcomeStore::new(),
        };
        Self {
            core: BridgeCore::new(library, config, delivery),
        }
    }

    pub fn create_client(&self, endpoint: &str, secure: bool) -> Handle {
        self.core.create_client(endpoint, secure)
    }

    pub fn get_endpoint(&self, client: Handle) -> String {
        self.core
            .endpoint(client)
            .map(|endpoint| endpoint.ws_url())
            .unwrap_or_default()
    }

    /// Reads and forgets a stored result. Unknown or already read ids give `"null"`.
    pub fn get_result(&self, result: ResultId) -> String {
        self.core.lock().delivery.results.take_or_null(&result)
    }

    /// Results stored but not yet read.
    pub fn pending_results(&self) -> usize {
        self.core.lock().delivery.results.len()
    }

    pub fn join_or_create(
        &self,
        client: Handle,
        name: &str,
        options: &str,
        callbacks: OutcomeCallbacks,
    ) -> Handle {
        let name = name.to_string();
        self.start(client, options, callbacks, |options| JoinRequest::JoinOrCreate {
            name,
            options,
        })
    }

    pub fn create(
        &self,
        client: Handle,
        name: &str,
        options: &str,
        callbacks: OutcomeCallbacks,
    ) -> Handle {
        let name = name.to_string();
        self.start(client, options, callbacks, |options| JoinRequest::Create { name, options })
    }

    pub fn join(
        &self,
        client: Handle,
        name: &str,
        options: &str,
        callbacks: OutcomeCallbacks,
    ) -> Handle {
        let name = name.to_string();
        self.start(client, options, callbacks, |options| JoinRequest::Join { name, options })
    }

    pub fn join_by_id(
        &self,
        client: Handle,
        room_id: &str,
        options: &str,
        callbacks: OutcomeCallbacks,
    ) -> Handle {
        let room_id = room_id.to_string();
        self.start(client, options, callbacks, |options| JoinRequest::JoinById {
            room_id,
            options,
        })
    }

    pub fn reconnect(&self, client: Handle, token: &str, callbacks: OutcomeCallbacks) -> Handle {
        let token = token.to_string();
        self.core
            .start(client, JoinRequest::Reconnect { token }, callbacks)
    }

    fn start(
        &self,
        client: Handle,
        options: &str,
        callbacks: OutcomeCallbacks,
        request: impl FnOnce(Value) -> JoinRequest,
    ) -> Handle {
        match self.core.join_options(options) {
            Ok(options) => self.core.start(client, request(options), callbacks),
            Err(err) => self.core.start_failed(
                client,
                error_codes::INVALID_OPTIONS,
                format!("Invalid join options: {}", err),
                callbacks,
            ),
        }
    }

    fn set_hook(&self, room: Handle, set: impl FnOnce(&mut RoomHooks)) -> bool {
        let mut state = self.core.lock();
        match state.handles.connection_mut(&room) {
            Ok(connection) => {
                set(&mut connection.hooks);
                true
            }
            Err(err) => {
                debug!("Hook on {} not set: {}", room, err);
                false
            }
        }
    }

    /// Receives the full state JSON on every full-state replace.
    pub fn set_on_state_change(&self, room: Handle, callback: HostCallback) -> bool {
        self.set_hook(room, |hooks| hooks.on_state_change = Some(callback))
    }

    /// Receives `{type, data}` for every application message.
    pub fn set_on_message(&self, room: Handle, callback: HostCallback) -> bool {
        self.set_hook(room, |hooks| hooks.on_message = Some(callback))
    }

    /// Receives `{code}` when the room closes.
    pub fn set_on_leave(&self, room: Handle, callback: HostCallback) -> bool {
        self.set_hook(room, |hooks| hooks.on_leave = Some(callback))
    }

    /// Receives `{code, message}` for room errors and send failures.
    pub fn set_on_error(&self, room: Handle, callback: HostCallback) -> bool {
        self.set_hook(room, |hooks| hooks.on_error = Some(callback))
    }

    /// Receives every non-empty mutation batch as a JSON array of change records.
    pub fn setup_raw_changes(&self, room: Handle, callback: HostCallback) -> bool {
        self.set_hook(room, |hooks| hooks.raw_changes = Some(callback))
    }

    /// Sends `data_json` parsed as JSON; empty or `null` sends no payload.
    pub fn send(&self, room: Handle, kind: &str, data_json: &str) -> bool {
        self.send_json(room, MessageType::Name(kind.to_string()), data_json)
    }

    pub fn send_int(&self, room: Handle, kind: i32, data_json: &str) -> bool {
        self.send_json(room, MessageType::Code(kind), data_json)
    }

    fn send_json(&self, room: Handle, kind: MessageType, data_json: &str) -> bool {
        let data_json = data_json.trim();
        if data_json.is_empty() || data_json == "null" {
            return self.core.send(room, kind, SendPayload::Empty);
        }
        match serde_json::from_str(data_json) {
            Ok(value) => self.core.send(room, kind, SendPayload::Json(value)),
            Err(err) => {
                self.core
                    .send_failed(room, format!("payload is not valid JSON: {}", err));
                false
            }
        }
    }

    pub fn leave(&self, room: Handle, consented: bool) -> bool {
        self.core.leave(room, consented)
    }

    pub fn room_id(&self, room: Handle) -> String {
        self.core
            .with_connection(room, |connection| connection.id.clone())
            .unwrap_or_default()
    }

    pub fn session_id(&self, room: Handle) -> String {
        self.core
            .with_connection(room, |connection| connection.session_id.clone())
            .unwrap_or_default()
    }

    pub fn room_name(&self, room: Handle) -> String {
        self.core
            .with_connection(room, |connection| connection.name.clone())
            .unwrap_or_default()
    }

    pub fn has_joined(&self, room: Handle) -> bool {
        self.core.has_joined(room)
    }

    pub fn reconnection_token(&self, room: Handle) -> String {
        self.core.reconnection_token(room).unwrap_or_default()
    }

    pub fn lifecycle(&self, room: Handle) -> Option<Lifecycle> {
        self.core.lifecycle(room)
    }

    /// The room's replicated state as JSON, `"{}"` for an unknown room.
    pub fn get_state(&self, room: Handle) -> String {
        self.core
            .with_connection(room, |connection| connection.state_json().to_string())
            .unwrap_or_else(|| "{}".to_string())
    }

    /// Watches a field given by a dotted path from the root state.
    pub fn listen(
        &self,
        room: Handle,
        path: &str,
        callback: HostCallback,
    ) -> Result<Handle, BridgeError> {
        self.attach(room, ListenerKind::Property, ROOT_REF_ID, path, callback)
    }

    /// Watches `property` on a tracked entity.
    pub fn listen_entity(
        &self,
        room: Handle,
        ref_id: RefId,
        property: &str,
        callback: HostCallback,
    ) -> Result<Handle, BridgeError> {
        self.attach(room, ListenerKind::Property, ref_id, property, callback)
    }

    /// Watches entries added to the collection at a dotted path from the root state.
    pub fn on_add(
        &self,
        room: Handle,
        path: &str,
        callback: HostCallback,
    ) -> Result<Handle, BridgeError> {
        self.attach(room, ListenerKind::Add, ROOT_REF_ID, path, callback)
    }

    pub fn on_remove(
        &self,
        room: Handle,
        path: &str,
        callback: HostCallback,
    ) -> Result<Handle, BridgeError> {
        self.attach(room, ListenerKind::Remove, ROOT_REF_ID, path, callback)
    }

    /// Watches entries added to a collection under a tracked entity.
    pub fn on_add_entity(
        &self,
        room: Handle,
        ref_id: RefId,
        path: &str,
        callback: HostCallback,
    ) -> Result<Handle, BridgeError> {
        self.attach(room, ListenerKind::Add, ref_id, path, callback)
    }

    pub fn on_remove_entity(
        &self,
        room: Handle,
        ref_id: RefId,
        path: &str,
        callback: HostCallback,
    ) -> Result<Handle, BridgeError> {
        self.attach(room, ListenerKind::Remove, ref_id, path, callback)
    }

    fn attach(
        &self,
        room: Handle,
        kind: ListenerKind,
        anchor: RefId,
        path: &str,
        callback: HostCallback,
    ) -> Result<Handle, BridgeError> {
        let result = self.try_attach(room, kind, anchor, path, callback);
        if let Err(err) = &result {
            warn!("{}", err);
        }
        result
    }

    fn try_attach(
        &self,
        room: Handle,
        kind: ListenerKind,
        anchor: RefId,
        path: &str,
        callback: HostCallback,
    ) -> Result<Handle, BridgeError> {
        let spec = ListenerSpec::new(kind, anchor, path).ok_or_else(|| {
            BridgeError::ListenerAttachFailure {
                target: format!("{:?} '{}'", kind, path),
                reason: "path names no property".to_string(),
            }
        })?;

        let mut state = self.core.lock();
        let connection =
            state
                .handles
                .connection(&room)
                .map_err(|_| BridgeError::InvalidHandle {
                    handle: room,
                    context: "listener attach",
                })?;

        if connection.lifecycle != Lifecycle::Joined {
            return Err(BridgeError::ListenerAttachFailure {
                target: spec.describe(),
                reason: format!("room {} is {:?}", room, connection.lifecycle),
            });
        }
        if !connection.entities.contains(&anchor) {
            return Err(BridgeError::ListenerAttachFailure {
                target: spec.describe(),
                reason: format!("ref {} is not tracked", anchor),
            });
        }

        debug!("Listening for {} on room {}", spec.describe(), room);
        let handle = state.handles.insert(Resource::Listener(ListenerRecord {
            connection: room,
            spec,
            callback,
        }));
        state.handles.connection_mut(&room)?.listeners.push(handle);
        Ok(handle)
    }

    /// Detaches a listener. Returns false if `listener` is not a live listener.
    pub fn remove_listener(&self, listener: Handle) -> bool {
        let is_listener = self.core.lock().handles.listener(&listener).is_ok();
        if is_listener {
            self.core.release(listener);
        }
        is_listener
    }

    /// Releases a room handle, its listeners, and leaves the room if it is still open.
    pub fn dispose_room(&self, room: Handle) {
        self.core.release(room);
    }

    /// Releases a client handle together with every room it opened.
    pub fn dispose_client(&self, client: Handle) {
        self.core.release(client);
    }
}
