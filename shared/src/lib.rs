//! # Roomlink Shared
//! Handle table, event queue, completion bookkeeping and change serialization
//! shared by every host-facing bridge in roomlink-client.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use roomlink_serde::{
    BitReader, BitWrite, BitWriter, Serde, SerdeErr, SignedVariableInteger, UnsignedInteger,
    UnsignedVariableInteger,
};

mod changes;
mod error;
mod events;
mod handle;
mod outcome;
mod types;

pub use changes::{
    ChangeBatch, ChangeCodecError, ChangeRecord, ChangeValue, DataChange, DecodedValue,
    EntityEntry, EntityTable, FieldKey, MirrorNode, MirrorState, MirrorValue, Operation,
    Primitive, TargetKind, ValueKind, PACKED_VERSION,
};
pub use error::BridgeError;
pub use events::{EventKind, EventQueue, QueuedEvent, DEFAULT_EVENT_QUEUE_CAPACITY};
pub use handle::{Handle, HandleError, HandleGenerator, HandleTable};
pub use outcome::{FailedOutcome, JoinedOutcome, Outcome, OutcomeStore, ResultId};
pub use types::{
    error_codes, OperationCode, RefId, StatusCode, CLOSE_CONSENTED, CLOSE_NORMAL, ROOT_REF_ID,
};
