use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RefId;

/// Field name, map key or array index identifying a slot inside a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldKey {
    Index(u32),
    Name(String),
}

impl FieldKey {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Index(_) => None,
        }
    }

    /// Whether this key matches a path segment (names compare as text,
    /// indices as their decimal form).
    pub fn matches_segment(&self, segment: &str) -> bool {
        match self {
            Self::Name(name) => name == segment,
            Self::Index(index) => segment.parse::<u32>().ok() == Some(*index),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<u32> for FieldKey {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

/// Whether the mutated node is a structured object or a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Schema,
    Collection,
}

/// A value as produced by the session library's decoder. This is the only
/// place a value's shape is inspected; everything downstream works on the
/// classified `ChangeValue`.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedValue {
    Undefined,
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// A structural node carrying its decoder-assigned reference id.
    Node { ref_id: RefId },
    /// A composite the decoder could not express as a node or scalar.
    Opaque { type_name: String },
}

/// A plain scalar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Primitive {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(value) => Value::Bool(*value),
            Self::Integer(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::Text(value) => Value::String(value.clone()),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(value) => Some(Self::Boolean(*value)),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Float)),
            Value::String(value) => Some(Self::Text(value.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Wire tag of a classified value. Discriminants are part of the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Absent = 0,
    Primitive = 1,
    Reference = 2,
    Unrepresentable = 3,
}

impl ValueKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Absent),
            1 => Some(Self::Primitive),
            2 => Some(Self::Reference),
            3 => Some(Self::Unrepresentable),
            _ => None,
        }
    }
}

/// A classified change value.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeValue {
    Absent,
    Primitive(Primitive),
    Reference(RefId),
    Unrepresentable,
}

impl ChangeValue {
    pub fn classify(value: &DecodedValue) -> Self {
        match value {
            DecodedValue::Undefined => Self::Absent,
            DecodedValue::Null => Self::Primitive(Primitive::Null),
            DecodedValue::Boolean(value) => Self::Primitive(Primitive::Boolean(*value)),
            DecodedValue::Integer(value) => Self::Primitive(Primitive::Integer(*value)),
            DecodedValue::Float(value) => Self::Primitive(Primitive::Float(*value)),
            DecodedValue::Text(value) => Self::Primitive(Primitive::Text(value.clone())),
            DecodedValue::Node { ref_id } => Self::Reference(*ref_id),
            DecodedValue::Opaque { .. } => Self::Unrepresentable,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Absent => ValueKind::Absent,
            Self::Primitive(_) => ValueKind::Primitive,
            Self::Reference(_) => ValueKind::Reference,
            Self::Unrepresentable => ValueKind::Unrepresentable,
        }
    }

    pub fn reference(&self) -> Option<RefId> {
        match self {
            Self::Reference(ref_id) => Some(*ref_id),
            _ => None,
        }
    }

    /// Payload half of the wire pair. Absent and unrepresentable carry `null`.
    pub fn payload(&self) -> Value {
        match self {
            Self::Primitive(primitive) => primitive.to_json(),
            Self::Reference(ref_id) => Value::from(*ref_id),
            Self::Absent | Self::Unrepresentable => Value::Null,
        }
    }

    pub fn from_wire(kind: ValueKind, payload: &Value) -> Option<Self> {
        match kind {
            ValueKind::Absent => Some(Self::Absent),
            ValueKind::Unrepresentable => Some(Self::Unrepresentable),
            ValueKind::Primitive => Primitive::from_json(payload).map(Self::Primitive),
            ValueKind::Reference => payload
                .as_u64()
                .and_then(|ref_id| RefId::try_from(ref_id).ok())
                .map(Self::Reference),
        }
    }
}
