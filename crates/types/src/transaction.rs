//! Transaction role and status machine vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a transaction does to its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionRole {
    Install,
    Remove,
}

/// Status of an in-flight transaction.
///
/// Lifecycle: `Setup -> {Queued | Downloading} -> Committing` and then one
/// of the three terminal states. Backends are free to skip intermediate
/// states (a removal has nothing to download) but must end in exactly one
/// terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Being set up, not yet handed to the native layer.
    #[default]
    Setup,
    /// Waiting for the native layer to pick it up.
    Queued,
    /// Payload download in progress.
    Downloading,
    /// Native commit in progress; usually past the point of cancellation.
    Committing,
    /// Finished successfully.
    Done,
    /// Finished with an error; the resource state is left untouched.
    DoneWithError,
    /// Cancelled before completion.
    Cancelled,
}

impl TransactionStatus {
    /// Terminal states trigger removal from the registry exactly once.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::DoneWithError | Self::Cancelled)
    }

    /// Active states contribute to aggregate progress reporting.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Downloading | Self::Committing)
    }

    /// Human-readable status line, role-aware for the committing phase.
    #[must_use]
    pub fn text(self, role: TransactionRole) -> &'static str {
        match self {
            Self::Setup => "Starting",
            Self::Queued => "Waiting",
            Self::Downloading => "Downloading",
            Self::Committing => match role {
                TransactionRole::Install => "Installing",
                TransactionRole::Remove => "Removing",
            },
            Self::Done => "Done",
            Self::DoneWithError => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::DoneWithError => "done-with-error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Coarse phase an updater reports per resource while a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdaterState {
    None,
    Downloading,
    Installing,
    Done,
}

impl From<TransactionStatus> for UpdaterState {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Setup | TransactionStatus::Queued => Self::None,
            TransactionStatus::Downloading => Self::Downloading,
            TransactionStatus::Committing => Self::Installing,
            TransactionStatus::Done
            | TransactionStatus::DoneWithError
            | TransactionStatus::Cancelled => Self::Done,
        }
    }
}
