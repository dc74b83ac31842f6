//! The surface every backend exposes to the core

use std::sync::Arc;

use pkgdeck_errors::Result;
use pkgdeck_resources::{Filters, Resource, ResultsStream};
use pkgdeck_transactions::Transaction;

use crate::updater::BackendUpdater;

/// Placeholder progress reported while an update check is running and the
/// native layer has not produced a real percentage yet.
pub const FETCHING_PROGRESS_PLACEHOLDER: u8 = 42;

/// One package-management ecosystem adapter.
///
/// Implementations answer searches with a stream handle immediately and do
/// their native work asynchronously; install and remove return a
/// transaction the caller registers with the model. Whatever async
/// mechanism a backend uses internally, it must resolve into exactly one
/// terminal transaction status and exactly one stream completion.
pub trait ResourcesBackend: Send + Sync {
    /// Stable backend identifier ("dummy", "packagekit", ...). Also the
    /// backend half of every [`pkgdeck_types::ResourceKey`] this backend
    /// hands out.
    fn name(&self) -> &str;

    /// Answer `filters` with a stream of matching resources.
    fn search(&self, filters: &Filters) -> ResultsStream;

    /// Create (but do not register) an install transaction for `resource`.
    ///
    /// # Errors
    ///
    /// Fails when the backend cannot even start the operation, e.g. the
    /// resource is no longer tracked or the native layer is down.
    fn install_application(&self, resource: &Resource) -> Result<Transaction>;

    /// Create a removal transaction for `resource`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ResourcesBackend::install_application`].
    fn remove_application(&self, resource: &Resource) -> Result<Transaction>;

    /// The upgrade coordinator for this backend.
    fn updater(&self) -> Arc<dyn BackendUpdater>;

    /// Whether the backend is still populating its resource set or running
    /// an update check.
    fn is_fetching(&self) -> bool;

    /// Update-check progress, 0-100. While fetching without a native
    /// percentage this reports a mid-range placeholder so progress bars
    /// show indeterminate-ish motion instead of 0.
    fn fetching_updates_progress(&self) -> u8 {
        if self.is_fetching() {
            FETCHING_PROGRESS_PLACEHOLDER
        } else {
            100
        }
    }

    /// Look up a tracked resource by package name.
    fn find_resource(&self, name: &str) -> Option<Resource>;
}
