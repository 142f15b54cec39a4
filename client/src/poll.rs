use std::sync::Arc;

use log::debug;
use serde_json::Value;

use roomlink_shared::{
    error_codes, BridgeError, EventKind, EventQueue, Handle, HandleTable, Outcome, QueuedEvent,
    StatusCode,
};

use crate::{
    relay::{BridgeCore, Deferred, Delivery, RoomNotice},
    resource::{Lifecycle, Resource},
    session::{JoinRequest, MessageType, SendPayload, SessionLibrary},
    BridgeConfig,
};

/// Delivers everything as queued events for the host to poll.
pub(crate) struct PollDelivery {
    queue: EventQueue<QueuedEvent>,
}

impl PollDelivery {
    fn new(capacity: usize) -> Self {
        Self {
            queue: EventQueue::new(capacity),
        }
    }

    fn push(&mut self, event: QueuedEvent) {
        debug!("Queued {:?} for {}", event.kind, event.handle);
        self.queue.push(event);
    }
}

impl Delivery for PollDelivery {
    type Continuation = ();

    fn settle(&mut self, handle: Handle, outcome: Outcome, _: (), _: &mut Deferred) {
        let event = match outcome {
            Outcome::Joined(joined) => {
                QueuedEvent::new(EventKind::RoomJoin, handle).with_message(joined.id)
            }
            Outcome::Failed(failed) => QueuedEvent::new(EventKind::ClientError, handle)
                .with_code(failed.code)
                .with_message(failed.message),
        };
        self.push(event);
    }

    fn reject(&mut self, outcome: Outcome, _: (), _: &mut Deferred) {
        // the host already got Handle::NONE back
        debug!("Operation rejected without an event: {:?}", outcome);
    }

    fn room_event(
        &mut self,
        handle: Handle,
        notice: RoomNotice,
        _: &HandleTable<Resource>,
        _: &mut Deferred,
    ) {
        let event = match notice {
            RoomNotice::StateReplaced(state) => QueuedEvent::new(EventKind::StateChange, handle)
                .with_data(state.to_string().into_bytes()),
            RoomNotice::Mutations { batch, .. } => {
                if batch.is_empty() {
                    return;
                }
                QueuedEvent::new(EventKind::StateMutation, handle).with_data(batch.to_packed())
            }
            RoomNotice::Message { kind, data } => QueuedEvent::new(EventKind::Message, handle)
                .with_code(kind.code())
                .with_message(kind.label())
                .with_data(data.to_bytes()),
            RoomNotice::Error { code, message } => QueuedEvent::new(EventKind::RoomError, handle)
                .with_code(code)
                .with_message(message),
            RoomNotice::Leave { code, reason } => QueuedEvent::new(EventKind::RoomLeave, handle)
                .with_code(code)
                .with_message(reason),
        };
        self.push(event);
    }

    fn send_failed(
        &mut self,
        handle: Handle,
        error: &BridgeError,
        _: &HandleTable<Resource>,
        _: &mut Deferred,
    ) {
        self.push(
            QueuedEvent::new(EventKind::SendError, handle)
                .with_code(error.code())
                .with_message(error.to_string()),
        );
    }
}

/// Bridge for hosts that poll once per frame. Every asynchronous result and
/// room event becomes a `QueuedEvent`; `poll_event` pops one and exposes its
/// fields through the `event_*` accessors until the next poll.
pub struct PollBridge {
    core: BridgeCore<PollDelivery>,
    current: QueuedEvent,
}

impl PollBridge {
    pub fn new(library: Arc<dyn SessionLibrary>) -> Self {
        Self::with_config(library, BridgeConfig::default())
    }

    pub fn with_config(library: Arc<dyn SessionLibrary>, config: BridgeConfig) -> Self {
        let delivery = PollDelivery::new(config.event_queue_capacity);
        Self {
            core: BridgeCore::new(library, config, delivery),
            current: QueuedEvent::none(),
        }
    }

    /// Returns `Handle::NONE` if the endpoint is malformed or the library
    /// refuses to connect.
    pub fn create_client(&self, endpoint: &str, secure: bool) -> Handle {
        self.core.create_client(endpoint, secure)
    }

    pub fn get_endpoint(&self, client: Handle) -> String {
        self.core
            .endpoint(client)
            .map(|endpoint| endpoint.ws_url())
            .unwrap_or_default()
    }

    pub fn join_or_create(&self, client: Handle, name: &str, options: &str) -> Handle {
        let name = name.to_string();
        self.start(client, options, |options| JoinRequest::JoinOrCreate { name, options })
    }

    pub fn create(&self, client: Handle, name: &str, options: &str) -> Handle {
        let name = name.to_string();
        self.start(client, options, |options| JoinRequest::Create { name, options })
    }

    pub fn join(&self, client: Handle, name: &str, options: &str) -> Handle {
        let name = name.to_string();
        self.start(client, options, |options| JoinRequest::Join { name, options })
    }

    pub fn join_by_id(&self, client: Handle, room_id: &str, options: &str) -> Handle {
        let room_id = room_id.to_string();
        self.start(client, options, |options| JoinRequest::JoinById { room_id, options })
    }

    pub fn reconnect(&self, client: Handle, token: &str) -> Handle {
        let token = token.to_string();
        self.core.start(client, JoinRequest::Reconnect { token }, ())
    }

    fn start(
        &self,
        client: Handle,
        options: &str,
        request: impl FnOnce(Value) -> JoinRequest,
    ) -> Handle {
        match self.core.join_options(options) {
            Ok(options) => self.core.start(client, request(options), ()),
            Err(err) => self.core.start_failed(
                client,
                error_codes::INVALID_OPTIONS,
                format!("Invalid join options: {}", err),
                (),
            ),
        }
    }

    /// Pops the next event into the current slot and returns its kind.
    /// An empty queue clears the slot and returns `EventKind::None`.
    pub fn poll_event(&mut self) -> EventKind {
        let next = self.core.lock().delivery.queue.pop();
        self.current = next.unwrap_or_else(QueuedEvent::none);
        self.current.kind
    }

    pub fn pending_events(&self) -> usize {
        self.core.lock().delivery.queue.len()
    }

    /// Events dropped because the queue was full, since it was last drained.
    pub fn dropped_events(&self) -> u64 {
        self.core.lock().delivery.queue.evicted_count()
    }

    pub fn current_event(&self) -> &QueuedEvent {
        &self.current
    }

    pub fn event_kind(&self) -> EventKind {
        self.current.kind
    }

    pub fn event_room(&self) -> Handle {
        self.current.handle
    }

    pub fn event_code(&self) -> StatusCode {
        self.current.code
    }

    pub fn event_message(&self) -> &str {
        &self.current.message
    }

    pub fn event_data(&self) -> &[u8] {
        self.current.data()
    }

    pub fn event_data_length(&self) -> usize {
        self.current.data().len()
    }

    pub fn send(&self, room: Handle, kind: &str, data: &str) -> bool {
        self.core.send(
            room,
            MessageType::Name(kind.to_string()),
            SendPayload::Text(data.to_string()),
        )
    }

    pub fn send_bytes(&self, room: Handle, kind: &str, data: &[u8]) -> bool {
        self.core.send(
            room,
            MessageType::Name(kind.to_string()),
            SendPayload::Bytes(data.to_vec()),
        )
    }

    pub fn send_int(&self, room: Handle, kind: i32, data: &str) -> bool {
        self.core
            .send(room, MessageType::Code(kind), SendPayload::Text(data.to_string()))
    }

    /// Consented leave. The room handle stays valid until freed.
    pub fn leave(&self, room: Handle) -> bool {
        self.core.leave(room, true)
    }

    /// Releases a client or room handle and everything it owns. Unknown or
    /// already released handles are ignored.
    pub fn free(&self, handle: Handle) {
        self.core.release(handle);
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
}
