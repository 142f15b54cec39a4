//! The external session library, as the bridge consumes it. Connecting,
//! matchmaking, wire decoding and reconnection all live behind these traits.

mod error;

pub use error::TransportError;

use std::sync::Arc;

use serde_json::Value;

use roomlink_shared::{DataChange, StatusCode};

use crate::Endpoint;

pub trait SessionLibrary: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Session>, TransportError>;
}

pub trait Session: Send + Sync {
    /// Starts a join-style request. `completion` runs exactly once, either
    /// before this call returns or later on any thread.
    fn matchmake(&self, request: JoinRequest, completion: JoinCompletion);
}

pub type JoinCompletion =
    Box<dyn FnOnce(Result<Arc<dyn RoomConnection>, RemoteError>) + Send + 'static>;

/// Receives every event of one room, in arrival order.
pub type RoomEventHandler = Box<dyn FnMut(RoomEvent) + Send + 'static>;

pub trait RoomConnection: Send + Sync {
    fn id(&self) -> String;
    fn session_id(&self) -> String;
    fn name(&self) -> String;
    fn reconnection_token(&self) -> Option<String>;
    fn is_open(&self) -> bool;
    /// Called once, outside the bridge lock and before the join outcome is
    /// delivered. The handler may run from inside this call.
    fn subscribe(&self, handler: RoomEventHandler);
    fn send(&self, kind: &MessageType, payload: SendPayload) -> Result<(), TransportError>;
    fn leave(&self, consented: bool) -> Result<(), TransportError>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum JoinRequest {
    JoinOrCreate { name: String, options: Value },
    Create { name: String, options: Value },
    Join { name: String, options: Value },
    JoinById { room_id: String, options: Value },
    Reconnect { token: String },
}

impl JoinRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::JoinOrCreate { .. } => "joinOrCreate",
            Self::Create { .. } => "create",
            Self::Join { .. } => "join",
            Self::JoinById { .. } => "joinById",
            Self::Reconnect { .. } => "reconnect",
        }
    }

    /// Room name, room id or reconnection token, whichever the request targets.
    pub fn target(&self) -> &str {
        match self {
            Self::JoinOrCreate { name, .. }
            | Self::Create { name, .. }
            | Self::Join { name, .. } => name,
            Self::JoinById { room_id, .. } => room_id,
            Self::Reconnect { token } => token,
        }
    }
}

/// Failure reported by the remote side or the transport for a join-style request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteError {
    pub code: StatusCode,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    Name(String),
    Code(i32),
}

impl MessageType {
    /// Name, or the decimal form of a numeric type.
    pub fn label(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Code(code) => code.to_string(),
        }
    }

    /// Numeric type, 0 for named types.
    pub fn code(&self) -> i32 {
        match self {
            Self::Name(_) => 0,
            Self::Code(code) => *code,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Name(name) => Value::String(name.clone()),
            Self::Code(code) => Value::from(*code),
        }
    }
}

/// Body of an inbound application message.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageData {
    Bytes(Vec<u8>),
    Value(Value),
}

impl MessageData {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.clone(),
            Self::Value(value) => value.to_string().into_bytes(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bytes(bytes) => Value::from(bytes.clone()),
            Self::Value(value) => value.clone(),
        }
    }
}

/// Body of an outbound application message.
#[derive(Clone, Debug, PartialEq)]
pub enum SendPayload {
    Empty,
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RoomEvent {
    /// Full state, sent once on the initial synchronization.
    StateReplaced(Value),
    /// One decoded mutation batch.
    StateChanged(Vec<DataChange>),
    Message { kind: MessageType, data: MessageData },
    Error { code: StatusCode, message: String },
    Leave { code: StatusCode, reason: String },
}
