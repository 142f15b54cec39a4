mod change_batch;
mod change_record;
mod data_change;
mod entity_table;
mod error;
mod mirror;
mod operation;
mod packed;
mod value;

pub use change_batch::ChangeBatch;
pub use change_record::ChangeRecord;
pub use data_change::DataChange;
pub use entity_table::{EntityEntry, EntityTable};
pub use error::ChangeCodecError;
pub use mirror::{MirrorNode, MirrorState, MirrorValue};
pub use operation::Operation;
pub use packed::PACKED_VERSION;
pub use value::{ChangeValue, DecodedValue, FieldKey, Primitive, TargetKind, ValueKind};
