//! # Roomlink Client
//! Bridges that let a host scripting runtime drive a networked room session
//! library through integer handles. `PollBridge` queues every outcome and
//! room event for the host to poll; `CallbackBridge` hands each one to a host
//! callback as a one-time result id.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use roomlink_shared::{
    error_codes, BridgeError, ChangeBatch, ChangeRecord, ChangeValue, DataChange, DecodedValue,
    EventKind, FieldKey, Handle, Operation, QueuedEvent, RefId, ResultId, StatusCode,
};

mod bridge_config;
mod callback;
mod endpoint;
mod listener;
mod poll;
mod relay;
mod resource;
mod session;

cfg_if! {
    if #[cfg(feature = "ffi")] {
        pub mod ffi;
    }
}

pub use bridge_config::BridgeConfig;
pub use callback::{CallbackBridge, OutcomeCallbacks};
pub use endpoint::{Endpoint, EndpointError};
pub use listener::ListenerKind;
pub use poll::PollBridge;
pub use resource::{HostCallback, Lifecycle};
pub use session::{
    JoinCompletion, JoinRequest, MessageData, MessageType, RemoteError, RoomConnection,
    RoomEvent, RoomEventHandler, SendPayload, Session, SessionLibrary, TransportError,
};
