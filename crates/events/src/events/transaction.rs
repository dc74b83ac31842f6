use serde::{Deserialize, Serialize};

use super::FailureContext;
use pkgdeck_types::{ResourceKey, TransactionRole, TransactionStatus};

/// Transaction lifecycle events emitted by the registry and by individual
/// transactions as their backend drivers push updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransactionEvent {
    /// A transaction entered the registry.
    Added {
        resource: ResourceKey,
        role: TransactionRole,
    },

    /// The registry went from empty to non-empty. Presentation layers use
    /// this to reveal their global progress affordance.
    FirstStarted,

    /// Status transition pushed by the backend driver.
    StatusChanged {
        resource: ResourceKey,
        role: TransactionRole,
        old: TransactionStatus,
        new: TransactionStatus,
    },

    /// Progress update, 0-100.
    ProgressChanged { resource: ResourceKey, progress: u8 },

    /// Backend-reported cancellability flipped.
    CancellableChanged {
        resource: ResourceKey,
        cancellable: bool,
    },

    /// Download speed sample, bytes per second.
    DownloadSpeedChanged {
        resource: ResourceKey,
        bytes_per_second: u64,
    },

    /// A transaction reached a terminal status and left the registry. The
    /// bound resource is actionable again once this fires.
    Removed {
        resource: ResourceKey,
        status: TransactionStatus,
    },

    /// A transaction finished with an error.
    Failed {
        resource: ResourceKey,
        role: TransactionRole,
        failure: FailureContext,
    },

    /// The registry drained back to empty.
    AllFinished,
}
