use std::fmt;

use serde::{Deserialize, Serialize};

use crate::OperationCode;

/// Operation code of a change, as assigned by the replication transport.
/// Unknown codes are carried through untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(pub OperationCode);

impl Operation {
    pub const REPLACE: Operation = Operation(0);
    pub const CLEAR: Operation = Operation(10);
    pub const REVERSE: Operation = Operation(15);
    pub const DELETE_BY_REFID: Operation = Operation(33);
    pub const DELETE: Operation = Operation(64);
    pub const DELETE_AND_MOVE: Operation = Operation(96);
    pub const ADD: Operation = Operation(128);
    pub const ADD_BY_REFID: Operation = Operation(129);
    pub const DELETE_AND_ADD: Operation = Operation(192);

    pub fn code(&self) -> OperationCode {
        self.0
    }

    pub fn name(&self) -> &'static str {
        match *self {
            Self::REPLACE => "REPLACE",
            Self::CLEAR => "CLEAR",
            Self::REVERSE => "REVERSE",
            Self::DELETE_BY_REFID => "DELETE_BY_REFID",
            Self::DELETE => "DELETE",
            Self::DELETE_AND_MOVE => "DELETE_AND_MOVE",
            Self::ADD => "ADD",
            Self::ADD_BY_REFID => "ADD_BY_REFID",
            Self::DELETE_AND_ADD => "DELETE_AND_ADD",
            _ => "UNKNOWN",
        }
    }

    /// Whether the previous occupant of the slot leaves it.
    pub fn removes_previous(&self) -> bool {
        matches!(
            *self,
            Self::DELETE
                | Self::DELETE_AND_MOVE
                | Self::DELETE_AND_ADD
                | Self::DELETE_BY_REFID
                | Self::CLEAR
        )
    }

    /// Whether the slot ends up holding the change's new value.
    pub fn adds_value(&self) -> bool {
        matches!(
            *self,
            Self::ADD
                | Self::ADD_BY_REFID
                | Self::DELETE_AND_ADD
                | Self::REPLACE
                | Self::DELETE_AND_MOVE
        )
    }

    pub fn is_add(&self) -> bool {
        matches!(*self, Self::ADD | Self::ADD_BY_REFID | Self::DELETE_AND_ADD)
    }

    pub fn is_delete(&self) -> bool {
        matches!(*self, Self::DELETE | Self::DELETE_BY_REFID | Self::DELETE_AND_MOVE)
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::CLEAR
    }
}

impl From<OperationCode> for Operation {
    fn from(code: OperationCode) -> Self {
        Operation(code)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}
