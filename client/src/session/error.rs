use thiserror::Error;

/// Errors the session library reports from outbound room operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The room's connection is closed or was never opened
    #[error("Room connection is not open")]
    NotConnected,

    /// The library refused the payload or the operation
    #[error("Transport rejected the operation: {reason}")]
    Rejected { reason: String },
}
