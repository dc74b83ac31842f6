//! Updater coordination error types

use std::borrow::Cow;

use thiserror::Error;

use crate::UserFacingError;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpdateError {
    #[error("failed to refresh the list of updates: {message}")]
    RefreshFailed { message: String },

    #[error("failed to open the package database: {message}")]
    DatabaseUnavailable { message: String },

    #[error("upgrade simulation failed: {message}")]
    SimulationFailed { message: String },
}

impl UserFacingError for UpdateError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::RefreshFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::RefreshFailed { .. } => Some("update.refresh_failed"),
            Self::DatabaseUnavailable { .. } => Some("update.database_unavailable"),
            Self::SimulationFailed { .. } => Some("update.simulation_failed"),
        }
    }
}
