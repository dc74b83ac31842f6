use serde::{Deserialize, Serialize};

use pkgdeck_types::{ResourceKey, UpdaterState};

/// Updater batch coordination events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdateEvent {
    /// An updater started re-querying its backend for upgradeable items.
    CheckStarted { backend: String },

    /// Re-query finished; the upgradeable set now has `updates` entries.
    CheckFinished { backend: String, updates: usize },

    /// A batch of upgrade transactions was launched.
    BatchStarted { backend: String, targets: usize },

    /// Whether the updater currently has work in flight.
    ProgressingChanged { backend: String, progressing: bool },

    /// Aggregate batch progress, monotonically non-decreasing per batch.
    ProgressChanged {
        backend: String,
        progress: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        eta_seconds: Option<u64>,
        download_speed: u64,
    },

    /// Per-resource progress within the batch.
    ResourceProgressed {
        resource: ResourceKey,
        progress: u8,
        state: UpdaterState,
    },

    /// Aggregate cancellability flipped (OR over the batch).
    CancellableChanged { backend: String, cancellable: bool },

    /// A cancel was broadcast to all pending transactions in the batch.
    CancelRequested { backend: String },
}
