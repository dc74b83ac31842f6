//! In-memory backend for tests and the demo CLI
//!
//! Serves a deterministic catalog and simulates install/remove work by
//! stepping each transaction's driver through the download and commit
//! phases. Pacing is configurable: tests run instant (yield-only) steps,
//! the demo CLI uses real delays so progress is visible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use pkgdeck_config::UpdaterConfig;
use pkgdeck_errors::{BackendError, Error, Result};
use pkgdeck_events::EventSender;
use pkgdeck_resources::{Filters, Resource, ResultsStream, StreamResult};
use pkgdeck_transactions::{drive, driver_channel, Transaction, TransactionModel};
use pkgdeck_types::{ResourceKind, ResourceState, TransactionRole, TransactionStatus};

use crate::backend::ResourcesBackend;
use crate::updater::{BackendUpdater, StandardBackendUpdater};

/// How fast simulated transactions advance.
#[derive(Debug, Clone, Copy)]
pub enum DummyPacing {
    /// Yield between steps without sleeping; for tests.
    Instant,
    /// Sleep this long between steps; for the demo CLI.
    Paced(Duration),
}

impl DummyPacing {
    async fn pause(self) {
        match self {
            Self::Instant => tokio::task::yield_now().await,
            Self::Paced(delay) => tokio::time::sleep(delay).await,
        }
    }
}

/// The in-memory demo backend.
pub struct DummyBackend {
    name: String,
    catalog: Mutex<Vec<Resource>>,
    events: Option<EventSender>,
    pacing: DummyPacing,
    fetching: AtomicBool,
    updater: OnceLock<Arc<StandardBackendUpdater>>,
}

impl DummyBackend {
    pub fn new(
        model: &TransactionModel,
        config: &UpdaterConfig,
        events: Option<EventSender>,
        pacing: DummyPacing,
    ) -> Arc<Self> {
        let backend = Arc::new(Self {
            name: "dummy".to_owned(),
            catalog: Mutex::new(Self::seed_catalog(events.as_ref())),
            events: events.clone(),
            pacing,
            fetching: AtomicBool::new(false),
            updater: OnceLock::new(),
        });

        let weak: Weak<dyn ResourcesBackend> =
            Arc::downgrade(&(backend.clone() as Arc<dyn ResourcesBackend>));
        let updater = StandardBackendUpdater::new(
            backend.name.clone(),
            weak,
            model.clone(),
            config.clone(),
            events,
        );
        updater.set_upgradeable(
            backend
                .lock_catalog()
                .iter()
                .filter(|r| r.state() == ResourceState::Upgradeable)
                .cloned()
                .collect(),
        );
        backend
            .updater
            .set(updater)
            .unwrap_or_else(|_| unreachable!("updater set once"));
        backend
    }

    fn seed_catalog(events: Option<&EventSender>) -> Vec<Resource> {
        let build = |name: &str| {
            let mut builder = Resource::builder("dummy", name);
            if let Some(events) = events {
                builder = builder.events(events.clone());
            }
            builder
        };
        vec![
            build("krita")
                .appstream_id("org.kde.krita")
                .display_name("Krita")
                .comment("Digital painting studio")
                .state(ResourceState::Upgradeable)
                .installed_version("5.1.0")
                .available_version("5.2.0")
                .size(186_000_000)
                .origin("stable")
                .build(),
            build("kate")
                .appstream_id("org.kde.kate")
                .display_name("Kate")
                .comment("Advanced text editor")
                .state(ResourceState::None)
                .available_version("24.08")
                .size(12_000_000)
                .origin("stable")
                .build(),
            build("okular")
                .appstream_id("org.kde.okular")
                .display_name("Okular")
                .comment("Universal document viewer")
                .state(ResourceState::Installed)
                .installed_version("24.08")
                .size(9_500_000)
                .origin("stable")
                .build(),
            build("krita-plugin-gmic")
                .kind(ResourceKind::Addon)
                .display_name("G'MIC for Krita")
                .comment("Image processing filters")
                .extends(vec!["org.kde.krita".to_owned()])
                .state(ResourceState::Upgradeable)
                .installed_version("3.2")
                .available_version("3.3")
                .size(24_000_000)
                .origin("stable")
                .build(),
            build("libfoo")
                .kind(ResourceKind::Technical)
                .comment("Support library")
                .state(ResourceState::Upgradeable)
                .installed_version("1.4.1")
                .available_version("1.4.2")
                .size(800_000)
                .origin("stable")
                .build(),
            build("libbar")
                .kind(ResourceKind::Technical)
                .comment("Another support library")
                .state(ResourceState::Installed)
                .installed_version("0.9")
                .size(600_000)
                .origin("stable")
                .build(),
        ]
    }

    /// Flip the simulated "still populating" flag.
    pub fn set_fetching(&self, fetching: bool) {
        self.fetching.store(fetching, Ordering::Release);
    }

    /// Simulate the repository dropping a package: the resource leaves the
    /// catalog and any transaction bound to it is invalidated.
    pub fn drop_resource(&self, name: &str) -> Option<Resource> {
        let resource = {
            let mut catalog = self.lock_catalog();
            let index = catalog.iter().position(|r| r.package_name() == name)?;
            catalog.remove(index)
        };
        self.standard_updater().resource_removed(&resource);
        Some(resource)
    }

    /// The concrete updater, for callers that need more than the trait.
    #[must_use]
    pub fn standard_updater(&self) -> Arc<StandardBackendUpdater> {
        Arc::clone(self.updater.get().unwrap_or_else(|| unreachable!()))
    }

    fn lock_catalog(&self) -> std::sync::MutexGuard<'_, Vec<Resource>> {
        self.catalog
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn tracked(&self, resource: &Resource) -> Result<Resource> {
        self.lock_catalog()
            .iter()
            .find(|r| *r == resource)
            .cloned()
            .ok_or_else(|| {
                BackendError::ResourceNotFound {
                    resource: resource.key().to_string(),
                }
                .into()
            })
    }

    /// Simulate the operation: download phase (cancellable, stepped
    /// progress), then a commit phase that can no longer be aborted.
    fn spawn_worker(&self, transaction: &Transaction) {
        let (driver, rx) = driver_channel();
        drive(transaction.clone(), rx);

        let watched = transaction.clone();
        let pacing = self.pacing;
        let role = transaction.role();
        tokio::spawn(async move {
            let pre_commit = async {
                driver.status(TransactionStatus::Queued);
                pacing.pause().await;
                if role == TransactionRole::Install {
                    driver.status(TransactionStatus::Downloading);
                    for progress in [20u8, 40, 60, 80, 100] {
                        pacing.pause().await;
                        driver.progress(progress);
                        driver.download_speed(256_000);
                    }
                }
            };
            let cancelled = tokio::select! {
                () = pre_commit => false,
                () = watched.cancelled() => true,
            };
            if cancelled {
                driver.finish(Err(Error::Cancelled));
                return;
            }

            driver.status(TransactionStatus::Committing);
            driver.cancellable(false);
            pacing.pause().await;
            driver.finish(Ok(()));
        });
    }
}

impl ResourcesBackend for DummyBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn search(&self, filters: &Filters) -> ResultsStream {
        let upgradeable_query = filters.state == Some(ResourceState::Upgradeable);
        let results = self
            .lock_catalog()
            .iter()
            .filter(|r| filters.matches(r))
            // Technical entries only surface in update listings.
            .filter(|r| r.kind() != ResourceKind::Technical || upgradeable_query)
            .cloned()
            .map(StreamResult::new)
            .collect();
        ResultsStream::from_results(self.name.clone(), results)
    }

    fn install_application(&self, resource: &Resource) -> Result<Transaction> {
        let resource = self.tracked(resource)?;
        let transaction = match &self.events {
            Some(events) => {
                Transaction::with_events(resource, TransactionRole::Install, events.clone())
            }
            None => Transaction::new(resource, TransactionRole::Install),
        };
        self.spawn_worker(&transaction);
        Ok(transaction)
    }

    fn remove_application(&self, resource: &Resource) -> Result<Transaction> {
        let resource = self.tracked(resource)?;
        if !resource.state().is_installed() {
            return Err(BackendError::ResourceNotFound {
                resource: resource.key().to_string(),
            }
            .into());
        }
        let transaction = match &self.events {
            Some(events) => {
                Transaction::with_events(resource, TransactionRole::Remove, events.clone())
            }
            None => Transaction::new(resource, TransactionRole::Remove),
        };
        self.spawn_worker(&transaction);
        Ok(transaction)
    }

    fn updater(&self) -> Arc<dyn BackendUpdater> {
        self.standard_updater()
    }

    fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    fn find_resource(&self, name: &str) -> Option<Resource> {
        self.lock_catalog()
            .iter()
            .find(|r| r.package_name() == name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FETCHING_PROGRESS_PLACEHOLDER;
    use pkgdeck_errors::TransactionError;

    fn setup() -> (TransactionModel, Arc<DummyBackend>) {
        let model = TransactionModel::new();
        let backend = DummyBackend::new(
            &model,
            &UpdaterConfig {
                refresh_retry_ms: 1,
                ..UpdaterConfig::default()
            },
            None,
            DummyPacing::Instant,
        );
        (model, backend)
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn default_search_hides_technical_entries() {
        let (_, backend) = setup();
        let results = backend.search(&Filters::default()).collect().await;
        assert!(results
            .iter()
            .all(|r| r.resource.kind() != ResourceKind::Technical));
        assert!(results.iter().any(|r| r.resource.package_name() == "krita"));
    }

    #[tokio::test]
    async fn upgradeable_search_includes_technical_entries() {
        let (_, backend) = setup();
        let results = backend.search(&Filters::upgradeable()).collect().await;
        let names: Vec<&str> = results
            .iter()
            .map(|r| r.resource.package_name())
            .collect();
        assert!(names.contains(&"libfoo"));
        assert!(names.contains(&"krita"));
        assert!(!names.contains(&"libbar"));
    }

    #[tokio::test]
    async fn install_runs_to_completion() {
        let (model, backend) = setup();
        let kate = backend.find_resource("kate").expect("kate");
        let transaction = backend.install_application(&kate).expect("transaction");
        model.add(transaction.clone());

        wait_until(|| model.is_empty()).await;
        assert_eq!(transaction.status(), TransactionStatus::Done);
        assert_eq!(kate.state(), ResourceState::Installed);
        assert_eq!(kate.installed_version().as_deref(), Some("24.08"));
    }

    #[tokio::test]
    async fn removal_runs_to_completion() {
        let (model, backend) = setup();
        let okular = backend.find_resource("okular").expect("okular");
        let transaction = backend.remove_application(&okular).expect("transaction");
        model.add(transaction.clone());

        wait_until(|| model.is_empty()).await;
        assert_eq!(transaction.status(), TransactionStatus::Done);
        assert_eq!(okular.state(), ResourceState::None);
    }

    #[tokio::test]
    async fn removing_a_non_installed_resource_is_refused() {
        let (_, backend) = setup();
        let kate = backend.find_resource("kate").expect("kate");
        assert!(backend.remove_application(&kate).is_err());
    }

    #[tokio::test]
    async fn cancel_during_download_aborts() {
        let (model, backend) = setup();
        let kate = backend.find_resource("kate").expect("kate");
        let transaction = backend.install_application(&kate).expect("transaction");
        model.add(transaction.clone());
        transaction.cancel();

        wait_until(|| model.is_empty()).await;
        assert_eq!(transaction.status(), TransactionStatus::Cancelled);
        assert_eq!(kate.state(), ResourceState::None);
    }

    #[tokio::test]
    async fn unknown_resources_are_rejected() {
        let (_, backend) = setup();
        let stranger = Resource::builder("dummy", "stranger").build();
        assert!(backend.install_application(&stranger).is_err());
    }

    #[tokio::test]
    async fn full_upgrade_batch_against_the_dummy_catalog() {
        let (model, backend) = setup();
        let updater = backend.updater();
        // krita, the addon, and libfoo are upgradeable.
        assert_eq!(updater.updates_count(), 3);

        updater.prepare();
        updater.start();
        wait_until(|| !updater.is_progressing() && model.is_empty()).await;

        let krita = backend.find_resource("krita").expect("krita");
        assert_eq!(krita.state(), ResourceState::Installed);
        assert_eq!(krita.installed_version().as_deref(), Some("5.2.0"));

        // Post-batch refresh found nothing left to upgrade.
        wait_until(|| updater.updates_count() == 0).await;
    }

    #[tokio::test]
    async fn dropped_resource_invalidates_the_bound_transaction() {
        let model = TransactionModel::new();
        // Long pacing keeps the install in flight until the drop lands.
        let backend = DummyBackend::new(
            &model,
            &UpdaterConfig {
                refresh_retry_ms: 1,
                ..UpdaterConfig::default()
            },
            None,
            DummyPacing::Paced(Duration::from_secs(300)),
        );
        let kate = backend.find_resource("kate").expect("kate");
        let transaction = backend.install_application(&kate).expect("transaction");
        model.add(transaction.clone());

        backend.drop_resource("kate").expect("dropped");

        assert_eq!(transaction.status(), TransactionStatus::DoneWithError);
        assert!(matches!(
            transaction.error(),
            Some(Error::Transaction(TransactionError::ResourceGone { .. }))
        ));
        assert!(model.is_empty());
        assert!(backend.find_resource("kate").is_none());
        assert_eq!(kate.state(), ResourceState::None);
    }

    #[tokio::test]
    async fn dropping_an_upgradeable_resource_shrinks_the_update_set() {
        let (_, backend) = setup();
        let updater = backend.updater();
        assert_eq!(updater.updates_count(), 3);

        backend.drop_resource("libfoo").expect("dropped");
        assert_eq!(updater.updates_count(), 2);
        assert!(backend.drop_resource("libfoo").is_none());
    }

    #[tokio::test]
    async fn fetching_progress_reports_the_placeholder() {
        let (_, backend) = setup();
        assert_eq!(backend.fetching_updates_progress(), 100);
        backend.set_fetching(true);
        assert!(backend.is_fetching());
        assert_eq!(
            backend.fetching_updates_progress(),
            FETCHING_PROGRESS_PLACEHOLDER
        );
    }
}
