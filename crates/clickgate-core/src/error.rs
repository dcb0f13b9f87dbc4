//! Error taxonomy shared by the enhance adapter, trust records, and the
//! service registry.
//!
//! Every variant maps to a stable negative integer via [`SecCompError::code`]
//! so the transport layer can hand a plain status code back to the calling
//! application without knowing about Rust types.

use thiserror::Error;

use crate::domain::component::ComponentId;

/// Errors produced by the click trust pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecCompError {
    /// Malformed input, malformed descriptor, or a buffer contract violation
    /// (e.g. a non-empty declared size with no backing bytes).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// No enhance backend is loaded for the role that would answer this call.
    #[error("no enhancement backend available")]
    EnhanceUnavailable,

    /// The click event's authenticity payload is missing or malformed.
    #[error("click event is invalid: missing or malformed extra info")]
    ClickEventInvalid,

    /// A grant request is already waiting for the confirmation dialog.
    #[error("component {0} is already awaiting user confirmation")]
    PendingConfirmation(ComponentId),

    /// An external collaborator (dialog, permission bookkeeping) failed.
    #[error("callback operation failed: {0}")]
    CallbackOperationFailed(String),

    /// No trust record is registered under this id.
    #[error("component {0} is not registered")]
    ComponentNotFound(ComponentId),

    /// The descriptor reported by the UI diverges from the one on file.
    #[error("component {0} info does not match the registered descriptor")]
    ComponentInfoMismatch(ComponentId),

    /// The click event failed timing, geometry, or authenticity checks.
    #[error("click verification failed for component {0}")]
    ClickVerificationFailed(ComponentId),

    /// The caller does not own the component it is operating on.
    #[error("caller is not permitted to operate on component {0}")]
    PermissionDenied(ComponentId),

    /// A loaded backend rejected the call with its own status code.
    #[error("enhance backend returned {code}: {reason}")]
    Backend { code: i32, reason: String },

    /// The trust lifecycle does not allow this event in the current state.
    #[error("invalid trust transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },
}

impl SecCompError {
    /// Stable integer code for the transport layer. `0` is reserved for success.
    pub fn code(&self) -> i32 {
        match self {
            SecCompError::InvalidValue(_) => -1,
            SecCompError::EnhanceUnavailable => -2,
            SecCompError::ClickEventInvalid => -3,
            SecCompError::PendingConfirmation(_) => -4,
            SecCompError::CallbackOperationFailed(_) => -5,
            SecCompError::ComponentNotFound(_) => -6,
            SecCompError::ComponentInfoMismatch(_) => -7,
            SecCompError::ClickVerificationFailed(_) => -8,
            SecCompError::PermissionDenied(_) => -9,
            SecCompError::Backend { code, .. } => *code,
            SecCompError::InvalidTransition { .. } => -10,
        }
    }
}
