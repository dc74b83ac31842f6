//! Per-backend upgrade coordination

use chrono::{DateTime, Utc};

use pkgdeck_resources::Resource;

pub mod batch;
pub mod blocking;
pub mod speed;
pub mod standard;

pub use batch::{BatchUpdater, NativeBatch, NativeBatchEvent};
pub use blocking::{BlockingCommit, BlockingDbUpdater, UpgradeItem};
pub use standard::StandardBackendUpdater;

/// Upgrade coordinator contract, one instance per backend.
///
/// Tracks the `upgradeable` set (everything the backend reports a newer
/// version for) and the `to_upgrade` subset the user marked for
/// installation. `to_upgrade` is a subset of `upgradeable` at all times;
/// violating that is a caller bug and panics.
pub trait BackendUpdater: Send + Sync {
    /// Name of the backend this updater coordinates.
    fn backend_name(&self) -> &str;

    /// Snapshot `to_upgrade := upgradeable` and stamp the preparation
    /// time. Must run before [`BackendUpdater::start`].
    fn prepare(&self);

    /// Mark additional resources for upgrade.
    fn add_resources(&self, resources: &[Resource]);

    /// Unmark resources.
    fn remove_resources(&self, resources: &[Resource]);

    /// Launch one install transaction per marked resource. An empty
    /// `to_upgrade` set completes immediately without ever reporting
    /// progress.
    fn start(&self);

    /// Broadcast a cancel request to every pending transaction. Best
    /// effort; each transaction's own cancellable contract applies.
    fn cancel(&self);

    /// OR over the pending transactions' cancellable flags.
    fn is_cancellable(&self) -> bool;

    /// Whether a batch is currently in flight.
    fn is_progressing(&self) -> bool;

    /// Aggregate batch progress 0-100, monotonically non-decreasing
    /// within one batch.
    fn progress(&self) -> f64;

    /// Whether the upgradeable set is currently being re-queried.
    fn is_fetching_updates(&self) -> bool;

    /// Number of upgradeable resources.
    fn updates_count(&self) -> usize;

    /// Total download size of the marked resources, bytes.
    fn update_size(&self) -> u64;

    /// Smoothed aggregate download speed over the batch, bytes/sec.
    fn download_speed(&self) -> u64;

    /// Estimated seconds until the batch completes, when computable.
    fn eta_seconds(&self) -> Option<u64>;

    /// When the upgradeable set was last prepared or refreshed.
    fn last_update(&self) -> Option<DateTime<Utc>>;

    /// Snapshot of the upgradeable set.
    fn upgradeable(&self) -> Vec<Resource>;

    /// Snapshot of the marked subset.
    fn to_upgrade(&self) -> Vec<Resource>;
}
