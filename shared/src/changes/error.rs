use roomlink_serde::SerdeErr;
use thiserror::Error;

/// Errors raised while decoding a serialized change batch
#[derive(Debug, Error)]
pub enum ChangeCodecError {
    /// JSON text was not an array of 9-field change tuples
    #[error("Malformed JSON change batch: {0}")]
    Json(#[from] serde_json::Error),

    /// Packed stream was truncated or contained an invalid field
    #[error("Malformed packed change batch: {0}")]
    Packed(#[from] SerdeErr),

    /// Packed stream carries a version marker this build does not know
    #[error("Unsupported packed change batch version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    /// A value kind tag outside the closed enumeration
    #[error("Unknown value kind {kind} in change record")]
    UnknownValueKind { kind: u8 },

    /// A value payload that does not fit its declared kind
    #[error("Payload does not match value kind {kind:?}")]
    PayloadMismatch { kind: super::ValueKind },
}
