//! Resource identity and state types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Install state of a resource as reported by its backend.
///
/// The ordering matters: filters can ask for a *minimum* state, so the
/// variants are declared from "least installed" to "most actionable".
/// `ToInstall`/`ToRemove` are transient markers only the apt-family
/// backends use while a marking pass is underway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// Not installed.
    #[default]
    None,
    /// Installed but in an inconsistent state.
    Broken,
    /// Installed and healthy.
    Installed,
    /// Installed with a newer version available.
    Upgradeable,
    /// Marked for installation (apt-family transient marker).
    ToInstall,
    /// Marked for removal (apt-family transient marker).
    ToRemove,
}

impl ResourceState {
    /// Whether the resource is present on disk in some form.
    #[must_use]
    pub fn is_installed(self) -> bool {
        matches!(self, Self::Installed | Self::Upgradeable | Self::Broken)
    }
}

/// Broad classification of a resource, used by search filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A user-facing application.
    #[default]
    Application,
    /// An addon extending another application.
    Addon,
    /// A technical package (library, codec) normally hidden from browsing.
    Technical,
}

/// Backend-scoped identity of a resource.
///
/// Two resources are the same entity iff their keys are equal; the optional
/// appstream id lives on the resource itself because it identifies the
/// *logical* application across backends, not this backend's package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Name of the owning backend.
    pub backend: String,
    /// Package name, unique within the backend.
    pub name: String,
}

impl ResourceKey {
    /// Build a key from backend and package name.
    #[must_use]
    pub fn new(backend: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.backend, self.name)
    }
}
