use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OperationCode, RefId};

use super::{ChangeCodecError, ChangeValue, DataChange, FieldKey, Operation, TargetKind, ValueKind};

/// `[refId, op, field, dynamicIndex, isSchema, valueKind, value, prevKind, prev]`
type ChangeTuple = (
    RefId,
    OperationCode,
    FieldKey,
    Option<FieldKey>,
    u8,
    u8,
    Value,
    u8,
    Value,
);

/// The wire form of a single mutation. Field order is fixed; any change to it
/// must come with a new packed version marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChangeTuple", into = "ChangeTuple")]
pub struct ChangeRecord {
    pub ref_id: RefId,
    pub op: Operation,
    pub field: FieldKey,
    pub dynamic_index: Option<FieldKey>,
    /// Whether the mutated node is a structured object (as opposed to a collection).
    pub is_schema: bool,
    pub value: ChangeValue,
    pub previous_value: ChangeValue,
}

impl ChangeRecord {
    /// Classifies a decoder change into its wire form.
    pub fn from_change(change: &DataChange) -> Self {
        Self {
            ref_id: change.ref_id,
            op: change.op,
            field: change.field.clone(),
            dynamic_index: change.dynamic_index.clone(),
            is_schema: change.target == TargetKind::Schema,
            value: ChangeValue::classify(&change.value),
            previous_value: ChangeValue::classify(&change.previous_value),
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value.kind()
    }

    pub fn previous_kind(&self) -> ValueKind {
        self.previous_value.kind()
    }

    pub fn slot(&self) -> &FieldKey {
        self.dynamic_index.as_ref().unwrap_or(&self.field)
    }

    pub fn has_unrepresentable(&self) -> bool {
        self.value == ChangeValue::Unrepresentable
            || self.previous_value == ChangeValue::Unrepresentable
    }
}

impl From<ChangeRecord> for ChangeTuple {
    fn from(record: ChangeRecord) -> Self {
        (
            record.ref_id,
            record.op.code(),
            record.field,
            record.dynamic_index,
            u8::from(record.is_schema),
            record.value.kind().code(),
            record.value.payload(),
            record.previous_value.kind().code(),
            record.previous_value.payload(),
        )
    }
}

impl TryFrom<ChangeTuple> for ChangeRecord {
    type Error = ChangeCodecError;

    fn try_from(tuple: ChangeTuple) -> Result<Self, Self::Error> {
        let (ref_id, op, field, dynamic_index, is_schema, kind, payload, prev_kind, prev_payload) =
            tuple;
        Ok(Self {
            ref_id,
            op: Operation(op),
            field,
            dynamic_index,
            is_schema: is_schema != 0,
            value: wire_value(kind, &payload)?,
            previous_value: wire_value(prev_kind, &prev_payload)?,
        })
    }
}

fn wire_value(kind: u8, payload: &Value) -> Result<ChangeValue, ChangeCodecError> {
    let kind = ValueKind::from_code(kind).ok_or(ChangeCodecError::UnknownValueKind { kind })?;
    ChangeValue::from_wire(kind, payload).ok_or(ChangeCodecError::PayloadMismatch { kind })
}
