use thiserror::Error;

use super::Handle;

/// Errors raised by HandleTable bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// Handle was never bound, or has already been released
    #[error("Handle {handle:?} does not resolve to a live record")]
    NotFound { handle: Handle },

    /// Bind attempted on a handle that is not reserved (never allocated, or released while pending)
    #[error("Handle {handle:?} is not reserved and cannot be bound")]
    NotReserved { handle: Handle },

    /// Bind attempted on a handle that already has a record
    #[error("Handle {handle:?} is already bound to a record")]
    AlreadyBound { handle: Handle },

    /// Handle resolved, but to a different kind of record than the caller needs
    #[error("Handle {handle:?} refers to a {actual}, expected a {expected}")]
    KindMismatch {
        handle: Handle,
        expected: &'static str,
        actual: &'static str,
    },
}
