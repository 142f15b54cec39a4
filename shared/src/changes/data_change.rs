use crate::RefId;

use super::{DecodedValue, FieldKey, Operation, TargetKind};

/// One mutation as emitted by the session library's state decoder.
#[derive(Clone, Debug, PartialEq)]
pub struct DataChange {
    pub ref_id: RefId,
    pub op: Operation,
    pub field: FieldKey,
    pub dynamic_index: Option<FieldKey>,
    pub target: TargetKind,
    pub value: DecodedValue,
    pub previous_value: DecodedValue,
}

impl DataChange {
    /// A field change on a structured node.
    pub fn field(
        ref_id: RefId,
        op: Operation,
        field: impl Into<FieldKey>,
        value: DecodedValue,
    ) -> Self {
        Self {
            ref_id,
            op,
            field: field.into(),
            dynamic_index: None,
            target: TargetKind::Schema,
            value,
            previous_value: DecodedValue::Undefined,
        }
    }

    /// An entry change on a collection node, keyed by `key`.
    pub fn entry(
        ref_id: RefId,
        op: Operation,
        key: impl Into<FieldKey>,
        value: DecodedValue,
    ) -> Self {
        let key = key.into();
        Self {
            ref_id,
            op,
            field: key.clone(),
            dynamic_index: Some(key),
            target: TargetKind::Collection,
            value,
            previous_value: DecodedValue::Undefined,
        }
    }

    pub fn with_previous(mut self, previous_value: DecodedValue) -> Self {
        self.previous_value = previous_value;
        self
    }

    /// The key the change addresses inside its node.
    pub fn slot(&self) -> &FieldKey {
        self.dynamic_index.as_ref().unwrap_or(&self.field)
    }
}
