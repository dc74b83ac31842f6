use serde::{Deserialize, Serialize};

use pkgdeck_types::{ResourceKey, ResourceState};

/// Resource state notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResourceEvent {
    /// A resource's install state changed (e.g. after a successful
    /// transaction or a repository refresh).
    StateChanged {
        resource: ResourceKey,
        old: ResourceState,
        new: ResourceState,
    },

    /// The backend stopped tracking the resource. Any bound transaction
    /// has been invalidated by the time this fires.
    Removed { resource: ResourceKey },
}
