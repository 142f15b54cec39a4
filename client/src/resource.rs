use std::{collections::HashMap, sync::Arc};

use serde_json::{Map, Value};

use roomlink_shared::{
    ChangeBatch, EntityTable, Handle, HandleError, HandleTable, MirrorState, RefId, ResultId,
    ROOT_REF_ID,
};

use crate::{
    listener::ListenerSpec,
    session::{RoomConnection, RoomEvent, Session},
    Endpoint,
};

/// A host callback. The host reads the payload with the result id it is
/// handed.
pub type HostCallback = Arc<dyn Fn(ResultId) + Send + Sync + 'static>;

/// Where a room connection stands. A released handle has no lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Pending,
    Joined,
    Left,
    Failed,
}

pub(crate) enum Resource {
    Session(SessionRecord),
    Connection(ConnectionRecord),
    Listener(ListenerRecord),
}

impl Resource {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Session(_) => "session",
            Self::Connection(_) => "connection",
            Self::Listener(_) => "listener",
        }
    }
}

pub(crate) struct SessionRecord {
    pub endpoint: Endpoint,
    pub session: Arc<dyn Session>,
    /// Joined and still pending connections opened through this session
    pub connections: Vec<Handle>,
}

#[derive(Default)]
pub(crate) struct RoomHooks {
    pub on_state_change: Option<HostCallback>,
    pub on_message: Option<HostCallback>,
    pub on_leave: Option<HostCallback>,
    pub on_error: Option<HostCallback>,
    pub raw_changes: Option<HostCallback>,
}

pub(crate) struct ConnectionRecord {
    pub client: Handle,
    pub room: Arc<dyn RoomConnection>,
    pub id: String,
    pub session_id: String,
    pub name: String,
    pub lifecycle: Lifecycle,
    pub entities: EntityTable,
    pub mirror: MirrorState,
    /// Last full state the library pushed
    pub snapshot: Value,
    pub listeners: Vec<Handle>,
    pub hooks: RoomHooks,
    /// Whether the join outcome has reached the host
    pub delivered: bool,
    /// Events that arrived before the join outcome was delivered
    pub held: Vec<RoomEvent>,
}

impl ConnectionRecord {
    pub fn new(
        client: Handle,
        room: Arc<dyn RoomConnection>,
        id: String,
        session_id: String,
        name: String,
    ) -> Self {
        let mut entities = EntityTable::new();
        entities.track(ROOT_REF_ID);

        Self {
            client,
            room,
            id,
            session_id,
            name,
            lifecycle: Lifecycle::Joined,
            entities,
            mirror: MirrorState::new(),
            snapshot: Value::Object(Map::new()),
            listeners: Vec::new(),
            hooks: RoomHooks::default(),
            delivered: false,
            held: Vec::new(),
        }
    }

    /// Applies a serialized batch to the mirror. Returns the rendering of
    /// every reference the batch removed, taken just before its removal.
    pub fn apply_batch(&mut self, batch: &ChangeBatch) -> HashMap<RefId, Value> {
        let mut removed = HashMap::new();
        for record in batch {
            if record.op.removes_previous() {
                if let Some(previous) = record.previous_value.reference() {
                    removed
                        .entry(previous)
                        .or_insert_with(|| self.mirror.to_json(previous));
                }
            }
            self.mirror.apply_record(record);
        }
        self.mirror.prune();
        removed
    }

    /// Mirror of the replicated state, or the last full snapshot if no
    /// mutation batch has arrived yet.
    pub fn state_json(&self) -> Value {
        match self.mirror.node(ROOT_REF_ID) {
            Some(_) => self.mirror.root_json(),
            None => self.snapshot.clone(),
        }
    }
}

pub(crate) struct ListenerRecord {
    pub connection: Handle,
    pub spec: ListenerSpec,
    pub callback: HostCallback,
}

/// Kind-checked lookups on the bridge's handle table.
pub(crate) trait ResourceTable {
    fn session(&self, handle: &Handle) -> Result<&SessionRecord, HandleError>;
    fn session_mut(&mut self, handle: &Handle) -> Result<&mut SessionRecord, HandleError>;
    fn connection(&self, handle: &Handle) -> Result<&ConnectionRecord, HandleError>;
    fn connection_mut(&mut self, handle: &Handle) -> Result<&mut ConnectionRecord, HandleError>;
    fn listener(&self, handle: &Handle) -> Result<&ListenerRecord, HandleError>;
}

fn mismatch(handle: &Handle, expected: &'static str, actual: &Resource) -> HandleError {
    HandleError::KindMismatch {
        handle: *handle,
        expected,
        actual: actual.kind_name(),
    }
}

impl ResourceTable for HandleTable<Resource> {
    fn session(&self, handle: &Handle) -> Result<&SessionRecord, HandleError> {
        match self.resolve(handle)? {
            Resource::Session(record) => Ok(record),
            other => Err(mismatch(handle, "session", other)),
        }
    }

    fn session_mut(&mut self, handle: &Handle) -> Result<&mut SessionRecord, HandleError> {
        match self.resolve_mut(handle)? {
            Resource::Session(record) => Ok(record),
            other => Err(mismatch(handle, "session", other)),
        }
    }

    fn connection(&self, handle: &Handle) -> Result<&ConnectionRecord, HandleError> {
        match self.resolve(handle)? {
            Resource::Connection(record) => Ok(record),
            other => Err(mismatch(handle, "connection", other)),
        }
    }

    fn connection_mut(&mut self, handle: &Handle) -> Result<&mut ConnectionRecord, HandleError> {
        match self.resolve_mut(handle)? {
            Resource::Connection(record) => Ok(record),
            other => Err(mismatch(handle, "connection", other)),
        }
    }

    fn listener(&self, handle: &Handle) -> Result<&ListenerRecord, HandleError> {
        match self.resolve(handle)? {
            Resource::Listener(record) => Ok(record),
            other => Err(mismatch(handle, "listener", other)),
        }
    }
}
