use crate::{Handle, StatusCode};

/// Event kinds as the polling host sees them. The discriminants are part of
/// the host contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    None = 0,
    RoomJoin = 1,
    StateChange = 2,
    Message = 3,
    RoomError = 4,
    RoomLeave = 5,
    ClientError = 6,
    StateMutation = 7,
    SendError = 8,
}

impl EventKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::RoomJoin),
            2 => Some(Self::StateChange),
            3 => Some(Self::Message),
            4 => Some(Self::RoomError),
            5 => Some(Self::RoomLeave),
            6 => Some(Self::ClientError),
            7 => Some(Self::StateMutation),
            8 => Some(Self::SendError),
            _ => None,
        }
    }
}

/// A fixed-shape record handed to the polling host.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedEvent {
    pub kind: EventKind,
    pub handle: Handle,
    pub code: StatusCode,
    pub message: String,
    pub data: Option<Vec<u8>>,
}

impl QueuedEvent {
    pub fn new(kind: EventKind, handle: Handle) -> Self {
        Self {
            kind,
            handle,
            code: 0,
            message: String::new(),
            data: None,
        }
    }

    /// The empty record returned by a poll on an empty queue.
    pub fn none() -> Self {
        Self::new(EventKind::None, Handle::NONE)
    }

    pub fn with_code(mut self, code: StatusCode) -> Self {
        self.code = code;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}
