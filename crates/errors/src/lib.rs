#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the pkgdeck software-center core
//!
//! Fine-grained error enums organized by domain, aggregated into one
//! cross-crate `Error`. All variants are `Clone` so failed transactions can
//! carry their error past the point of failure for later display.

use std::borrow::Cow;

use thiserror::Error;

pub mod backend;
pub mod config;
pub mod transaction;
pub mod update;

pub use backend::BackendError;
pub use config::ConfigError;
pub use transaction::TransactionError;
pub use update::UpdateError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("update error: {0}")]
    Update(#[from] UpdateError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias for pkgdeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for a passive notification.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether re-invoking the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Transaction(err) => err.user_message(),
            Error::Backend(err) => err.user_message(),
            Error::Update(err) => err.user_message(),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Transaction(err) => err.user_hint(),
            Error::Backend(err) => err.user_hint(),
            Error::Update(err) => err.user_hint(),
            Error::Config(_) => Some("Check your pkgdeck configuration file."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Error::Transaction(err) => err.is_retryable(),
            Error::Backend(err) => err.is_retryable(),
            Error::Update(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Transaction(err) => err.user_code(),
            Error::Backend(err) => err.user_code(),
            Error::Update(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Cancelled => Some("error.cancelled"),
        }
    }
}
