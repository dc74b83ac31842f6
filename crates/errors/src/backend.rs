//! Backend adapter error types

use std::borrow::Cow;

use thiserror::Error;

use crate::UserFacingError;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendError {
    #[error("unknown backend: {name}")]
    UnknownBackend { name: String },

    #[error("backend {name} is not operational: {message}")]
    NotOperational { name: String, message: String },

    #[error("resource not found: {resource}")]
    ResourceNotFound { resource: String },

    #[error("native call failed: {message}")]
    NativeCallFailed { message: String },
}

impl UserFacingError for BackendError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotOperational { .. } => Some("Please verify Internet connectivity."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::NativeCallFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::UnknownBackend { .. } => Some("backend.unknown"),
            Self::NotOperational { .. } => Some("backend.not_operational"),
            Self::ResourceNotFound { .. } => Some("backend.resource_not_found"),
            Self::NativeCallFailed { .. } => Some("backend.native_call_failed"),
        }
    }
}
