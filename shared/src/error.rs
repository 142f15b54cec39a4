use thiserror::Error;

use crate::{error_codes, Handle, HandleError, RefId, StatusCode};

/// Errors surfaced to the host through the bridge
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    /// Handle does not resolve to a live object of the kind the call needs
    #[error("Invalid handle {handle:?} passed to {context}")]
    InvalidHandle {
        handle: Handle,
        context: &'static str,
    },

    /// Connect or join failed, or the handle was released before the join resolved
    #[error("Connection failure ({code}): {message}")]
    ConnectionFailure { code: StatusCode, message: String },

    /// Outbound message could not be handed to the transport
    #[error("Failed to send on {handle:?}: {reason}")]
    SendFailure { handle: Handle, reason: String },

    /// Listener could not be attached to its target
    #[error("Failed to attach listener to {target}: {reason}")]
    ListenerAttachFailure { target: String, reason: String },

    /// A change value the host encoding cannot express; forwarded, never dropped
    #[error("Unrepresentable value in change on ref {ref_id} field {field}")]
    UnrepresentableValue { ref_id: RefId, field: String },

    #[error(transparent)]
    Handle(#[from] HandleError),
}

impl BridgeError {
    /// Numeric code reported to the host alongside the message.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::InvalidHandle { .. } | Self::Handle(_) => error_codes::INVALID_HANDLE,
            Self::ConnectionFailure { code, .. } => *code,
            Self::SendFailure { .. } => error_codes::SEND_FAILURE,
            Self::ListenerAttachFailure { .. } => error_codes::LISTENER_ATTACH_FAILURE,
            Self::UnrepresentableValue { .. } => error_codes::UNREPRESENTABLE_VALUE,
        }
    }
}
