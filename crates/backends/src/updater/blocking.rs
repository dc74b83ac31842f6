//! Adapter for backends with a synchronous package database
//!
//! Alpine-apk-style managers expose blocking calls: a cheap read-only
//! upgrade simulation to discover what would change, and a commit that
//! applies the whole changeset in one synchronous operation. Both run on
//! `spawn_blocking`; progress callbacks from the worker thread are
//! marshalled over a channel and applied to the per-resource transactions
//! in lockstep on the async side. A commit cannot be aborted halfway
//! through a database write, so these transactions are never cancellable.

use std::sync::Arc;

use tokio::sync::mpsc;

use pkgdeck_errors::{Error, Result, UpdateError};
use pkgdeck_transactions::TransactionDriver;
use pkgdeck_types::TransactionStatus;

/// One entry of a simulated upgrade changeset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeItem {
    pub name: String,
    pub installed_version: String,
    pub available_version: String,
    /// Download size in bytes, when the database reports one.
    pub size: u64,
}

/// The native seam to a synchronous package database. Both methods run on
/// a blocking worker thread; implementations must not touch core state.
pub trait BlockingCommit: Send + Sync + 'static {
    /// Simulate a full upgrade without writing anything and return the
    /// changeset it would apply.
    ///
    /// # Errors
    ///
    /// An unopenable database must surface as
    /// [`pkgdeck_errors::UpdateError::DatabaseUnavailable`]; a solver
    /// rejection as [`pkgdeck_errors::UpdateError::SimulationFailed`].
    fn simulate(&self) -> Result<Vec<UpgradeItem>>;

    /// Commit the whole changeset. `progress` is invoked with 0-100 from
    /// the worker thread as the database applies changes.
    ///
    /// # Errors
    ///
    /// Fails on commit errors; policy rejection must surface as
    /// [`pkgdeck_errors::TransactionError::AuthorizationDenied`].
    fn commit(&self, progress: &mut dyn FnMut(u8)) -> Result<()>;
}

/// Drives blocking-database upgrades through the transaction machinery.
pub struct BlockingDbUpdater<C: BlockingCommit> {
    db: Arc<C>,
}

impl<C: BlockingCommit> BlockingDbUpdater<C> {
    pub fn new(db: Arc<C>) -> Self {
        Self { db }
    }

    /// Discover the upgradeable changeset with a read-only simulation.
    ///
    /// # Errors
    ///
    /// Propagates the simulation failure as an update error.
    pub async fn simulate(&self) -> Result<Vec<UpgradeItem>> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.simulate())
            .await
            .map_err(|e| {
                Error::from(UpdateError::SimulationFailed {
                    message: e.to_string(),
                })
            })?
    }

    /// Commit the upgrade, applying worker-thread progress to every driver
    /// in lockstep. The commit is all-or-nothing: every transaction ends
    /// with the same terminal status.
    pub async fn commit(&self, drivers: Vec<TransactionDriver>) {
        for driver in &drivers {
            // A database write cannot be unwound once started.
            driver.cancellable(false);
            driver.status(TransactionStatus::Committing);
        }

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u8>();
        let db = Arc::clone(&self.db);
        let worker = tokio::task::spawn_blocking(move || {
            let mut report = move |percent: u8| {
                let _ = progress_tx.send(percent);
            };
            db.commit(&mut report)
        });

        while let Some(percent) = progress_rx.recv().await {
            for driver in &drivers {
                driver.progress(percent);
            }
        }

        let outcome = match worker.await {
            Ok(result) => result,
            Err(join_error) => Err(Error::internal(format!(
                "commit worker panicked: {join_error}"
            ))),
        };

        match outcome {
            Ok(()) => {
                for driver in drivers {
                    driver.finish(Ok(()));
                }
            }
            Err(error) => {
                tracing::error!(%error, "database commit failed");
                for driver in drivers {
                    driver.finish(Err(error.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgdeck_errors::TransactionError;
    use pkgdeck_resources::Resource;
    use pkgdeck_transactions::{drive, driver_channel, Transaction};
    use pkgdeck_types::{ResourceState, TransactionRole};
    use std::sync::Mutex;

    struct FakeDb {
        changeset: Vec<UpgradeItem>,
        simulate_result: Mutex<Option<Error>>,
        commit_result: Mutex<Option<Error>>,
    }

    impl FakeDb {
        fn new(changeset: Vec<UpgradeItem>) -> Arc<Self> {
            Arc::new(Self {
                changeset,
                simulate_result: Mutex::new(None),
                commit_result: Mutex::new(None),
            })
        }

        fn failing(error: Error) -> Arc<Self> {
            Arc::new(Self {
                changeset: Vec::new(),
                simulate_result: Mutex::new(None),
                commit_result: Mutex::new(Some(error)),
            })
        }

        fn failing_simulation(error: Error) -> Arc<Self> {
            Arc::new(Self {
                changeset: Vec::new(),
                simulate_result: Mutex::new(Some(error)),
                commit_result: Mutex::new(None),
            })
        }
    }

    impl BlockingCommit for FakeDb {
        fn simulate(&self) -> Result<Vec<UpgradeItem>> {
            if let Some(error) = self.simulate_result.lock().unwrap().take() {
                return Err(error);
            }
            Ok(self.changeset.clone())
        }

        fn commit(&self, progress: &mut dyn FnMut(u8)) -> Result<()> {
            for percent in [25, 50, 75, 100] {
                progress(percent);
            }
            match self.commit_result.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    fn item(name: &str) -> UpgradeItem {
        UpgradeItem {
            name: name.to_owned(),
            installed_version: "1.0".to_owned(),
            available_version: "2.0".to_owned(),
            size: 512,
        }
    }

    fn wired(name: &str) -> (Transaction, TransactionDriver) {
        let resource = Resource::builder("apk", name)
            .state(ResourceState::Upgradeable)
            .available_version("2.0")
            .build();
        let transaction = Transaction::new(resource, TransactionRole::Install);
        let (driver, rx) = driver_channel();
        drive(transaction.clone(), rx);
        (transaction, driver)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn simulation_reports_the_changeset() {
        let updater = BlockingDbUpdater::new(FakeDb::new(vec![item("musl"), item("zlib")]));
        let changeset = updater.simulate().await.expect("simulate");
        assert_eq!(changeset.len(), 2);
        assert_eq!(changeset[0].name, "musl");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn an_unopenable_database_fails_the_simulation() {
        use pkgdeck_errors::UserFacingError;

        let updater = BlockingDbUpdater::new(FakeDb::failing_simulation(
            UpdateError::DatabaseUnavailable {
                message: "lock held by another process".to_owned(),
            }
            .into(),
        ));

        let error = updater.simulate().await.expect_err("failure");
        assert!(matches!(
            error,
            Error::Update(UpdateError::DatabaseUnavailable { .. })
        ));
        assert_eq!(error.user_code(), Some("update.database_unavailable"));
        assert!(!error.is_retryable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn commit_applies_progress_in_lockstep() {
        let (ta, da) = wired("musl");
        let (tb, db) = wired("zlib");
        let updater = BlockingDbUpdater::new(FakeDb::new(vec![item("musl"), item("zlib")]));

        updater.commit(vec![da, db]).await;
        settle().await;

        assert_eq!(ta.status(), TransactionStatus::Done);
        assert_eq!(tb.status(), TransactionStatus::Done);
        assert_eq!(ta.resource().state(), ResourceState::Installed);
        assert_eq!(tb.resource().state(), ResourceState::Installed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn committing_transactions_are_not_cancellable() {
        let (ta, da) = wired("musl");
        let updater = BlockingDbUpdater::new(FakeDb::new(vec![item("musl")]));

        updater.commit(vec![da]).await;
        settle().await;

        assert!(!ta.is_cancellable());
        assert_eq!(ta.status(), TransactionStatus::Done);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn authorization_denial_fails_every_transaction() {
        let (ta, da) = wired("musl");
        let (tb, db) = wired("zlib");
        let updater = BlockingDbUpdater::new(FakeDb::failing(
            TransactionError::AuthorizationDenied.into(),
        ));

        updater.commit(vec![da, db]).await;
        settle().await;

        for transaction in [&ta, &tb] {
            assert_eq!(transaction.status(), TransactionStatus::DoneWithError);
            assert!(matches!(
                transaction.error(),
                Some(Error::Transaction(TransactionError::AuthorizationDenied))
            ));
            // Failed commits leave the resource as it was.
            assert_eq!(transaction.resource().state(), ResourceState::Upgradeable);
        }
    }
}
