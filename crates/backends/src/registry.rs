//! Multi-backend fan-out

use std::sync::Arc;

use pkgdeck_config::SearchConfig;
use pkgdeck_resources::{Filters, Resource, StoredResultsStream};

use crate::backend::ResourcesBackend;

/// Owns the registered backends and fans searches out across them.
///
/// The preferred application backend (a config knob) decides which copy
/// survives when several backends report the same appstream id.
pub struct BackendRegistry {
    backends: Vec<Arc<dyn ResourcesBackend>>,
    preferred_backend: Option<String>,
}

impl BackendRegistry {
    #[must_use]
    pub fn new(search: &SearchConfig) -> Self {
        Self {
            backends: Vec::new(),
            preferred_backend: search.preferred_backend.clone(),
        }
    }

    pub fn register(&mut self, backend: Arc<dyn ResourcesBackend>) {
        tracing::debug!(backend = backend.name(), "registered backend");
        self.backends.push(backend);
    }

    #[must_use]
    pub fn backends(&self) -> &[Arc<dyn ResourcesBackend>] {
        &self.backends
    }

    #[must_use]
    pub fn backend(&self, name: &str) -> Option<&Arc<dyn ResourcesBackend>> {
        self.backends.iter().find(|b| b.name() == name)
    }

    /// The backend owning `resource`.
    #[must_use]
    pub fn backend_for(&self, resource: &Resource) -> Option<&Arc<dyn ResourcesBackend>> {
        self.backend(resource.backend())
    }

    /// Ask every backend at once and merge the answers into one
    /// deduplicated stream.
    #[must_use]
    pub fn search(&self, filters: &Filters) -> StoredResultsStream {
        let children = self
            .backends
            .iter()
            .map(|backend| backend.search(filters))
            .collect();
        StoredResultsStream::new(children)
            .with_preferred_backend(self.preferred_backend.clone())
    }

    /// First match for `name` across backends, preferring the preferred
    /// application backend's copy.
    #[must_use]
    pub fn find_resource(&self, name: &str) -> Option<Resource> {
        if let Some(preferred) = &self.preferred_backend {
            if let Some(resource) = self
                .backend(preferred)
                .and_then(|backend| backend.find_resource(name))
            {
                return Some(resource);
            }
        }
        self.backends
            .iter()
            .find_map(|backend| backend.find_resource(name))
    }

    /// Whether any backend is still populating or checking for updates.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.backends.iter().any(|backend| backend.is_fetching())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::BackendUpdater;
    use pkgdeck_errors::{BackendError, Result};
    use pkgdeck_resources::{ResultsStream, StreamResult};
    use pkgdeck_transactions::Transaction;
    use pkgdeck_types::ResourceState;

    struct CannedBackend {
        name: String,
        resources: Vec<Resource>,
    }

    impl CannedBackend {
        fn new(name: &str, resources: Vec<Resource>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                resources,
            })
        }
    }

    impl ResourcesBackend for CannedBackend {
        fn name(&self) -> &str {
            &self.name
        }

        fn search(&self, filters: &Filters) -> ResultsStream {
            let results = self
                .resources
                .iter()
                .filter(|r| filters.matches(r))
                .cloned()
                .map(StreamResult::new)
                .collect();
            ResultsStream::from_results(self.name.clone(), results)
        }

        fn install_application(&self, resource: &Resource) -> Result<Transaction> {
            Err(BackendError::ResourceNotFound {
                resource: resource.key().to_string(),
            }
            .into())
        }

        fn remove_application(&self, resource: &Resource) -> Result<Transaction> {
            self.install_application(resource)
        }

        fn updater(&self) -> Arc<dyn BackendUpdater> {
            unimplemented!("canned backend has no updater")
        }

        fn is_fetching(&self) -> bool {
            false
        }

        fn find_resource(&self, name: &str) -> Option<Resource> {
            self.resources
                .iter()
                .find(|r| r.package_name() == name)
                .cloned()
        }
    }

    fn app(backend: &str, name: &str, appstream: &str) -> Resource {
        Resource::builder(backend, name)
            .appstream_id(appstream)
            .state(ResourceState::None)
            .build()
    }

    fn registry_with(preferred: Option<&str>) -> BackendRegistry {
        let config = SearchConfig {
            preferred_backend: preferred.map(str::to_owned),
            ..SearchConfig::default()
        };
        let mut registry = BackendRegistry::new(&config);
        registry.register(CannedBackend::new(
            "snap",
            vec![app("snap", "krita", "org.kde.krita")],
        ));
        registry.register(CannedBackend::new(
            "packagekit",
            vec![
                app("packagekit", "krita", "org.kde.krita"),
                app("packagekit", "kate", "org.kde.kate"),
            ],
        ));
        registry
    }

    #[tokio::test]
    async fn search_merges_backends_and_applies_the_preference() {
        let registry = registry_with(Some("packagekit"));
        let results = registry
            .search(&Filters::default())
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        let krita = results
            .iter()
            .find(|r| r.resource.package_name() == "krita")
            .expect("krita");
        assert_eq!(krita.resource.backend(), "packagekit");
    }

    #[tokio::test]
    async fn search_without_preference_keeps_first_seen() {
        let registry = registry_with(None);
        let results = registry.search(&Filters::default()).collect().await;
        let krita = results
            .iter()
            .find(|r| r.resource.package_name() == "krita")
            .expect("krita");
        assert_eq!(krita.resource.backend(), "snap");
    }

    #[test]
    fn find_resource_prefers_the_preferred_backend() {
        let registry = registry_with(Some("packagekit"));
        let krita = registry.find_resource("krita").expect("krita");
        assert_eq!(krita.backend(), "packagekit");

        let registry = registry_with(None);
        let krita = registry.find_resource("krita").expect("krita");
        assert_eq!(krita.backend(), "snap");
    }

    #[test]
    fn backend_lookup_by_name() {
        let registry = registry_with(None);
        assert!(registry.backend("snap").is_some());
        assert!(registry.backend("flatpak").is_none());
        assert!(!registry.is_fetching());
    }
}
