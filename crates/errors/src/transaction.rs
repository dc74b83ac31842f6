//! Transaction subsystem error types

use std::borrow::Cow;

use thiserror::Error;

use crate::UserFacingError;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransactionError {
    #[error("commit failed: {message}")]
    CommitFailed { message: String },

    #[error("download failed: {message}")]
    DownloadFailed { message: String },

    #[error("authorization denied")]
    AuthorizationDenied,

    #[error("transaction is not cancellable")]
    NotCancellable,

    #[error("backend driver disappeared before reporting a terminal status")]
    DriverGone,

    #[error("resource no longer tracked by its backend: {resource}")]
    ResourceGone { resource: String },
}

impl UserFacingError for TransactionError {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            // Common and actionable, keep it recognizable rather than generic.
            Self::AuthorizationDenied => Cow::Borrowed("Authorization denied"),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::AuthorizationDenied => {
                Some("Your system policy does not allow this operation.")
            }
            Self::DownloadFailed { .. } => Some("Check your network connection and retry."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DownloadFailed { .. } | Self::CommitFailed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::CommitFailed { .. } => Some("transaction.commit_failed"),
            Self::DownloadFailed { .. } => Some("transaction.download_failed"),
            Self::AuthorizationDenied => Some("transaction.authorization_denied"),
            Self::NotCancellable => Some("transaction.not_cancellable"),
            Self::DriverGone => Some("transaction.driver_gone"),
            Self::ResourceGone { .. } => Some("transaction.resource_gone"),
        }
    }
}
