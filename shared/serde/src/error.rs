use std::{error::Error, fmt};

/// Raised when a reader runs out of bits or meets a value it can't decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerdeErr;

impl fmt::Display for SerdeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error while deserializing: stream was truncated or malformed")
    }
}

impl Error for SerdeErr {}
