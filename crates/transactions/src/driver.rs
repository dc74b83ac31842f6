//! Channel bridge between backend workers and a transaction
//!
//! Backend implementations differ wildly in how their native layer reports
//! progress (callbacks, polling, blocking calls on a worker thread). The
//! driver channel normalizes all of them: the worker holds a
//! [`TransactionDriver`] and pushes [`DriverEvent`]s; [`drive`] pumps them
//! into the transaction on the async side. Dropping the driver without a
//! terminal report is treated as a failure, so a panicking worker can
//! never strand a transaction in the registry.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use pkgdeck_errors::{Error, TransactionError};
use pkgdeck_types::TransactionStatus;

use crate::Transaction;

/// One update from a backend worker.
#[derive(Debug)]
pub enum DriverEvent {
    Status(TransactionStatus),
    Progress(u8),
    Cancellable(bool),
    DownloadSpeed(u64),
    RemainingTime(u64),
    /// Terminal report. `Err(Error::Cancelled)` maps to the cancelled
    /// status rather than a failure.
    Finished(Result<(), Error>),
}

/// Producer half held by the backend worker. Cloneable so a worker may
/// split download and commit reporting across tasks; the transaction
/// finishes when any clone sends `Finished` or the last clone drops.
#[derive(Clone)]
pub struct TransactionDriver {
    tx: UnboundedSender<DriverEvent>,
}

impl TransactionDriver {
    pub fn status(&self, status: TransactionStatus) {
        self.send(DriverEvent::Status(status));
    }

    pub fn progress(&self, progress: u8) {
        self.send(DriverEvent::Progress(progress));
    }

    pub fn cancellable(&self, cancellable: bool) {
        self.send(DriverEvent::Cancellable(cancellable));
    }

    pub fn download_speed(&self, bytes_per_second: u64) {
        self.send(DriverEvent::DownloadSpeed(bytes_per_second));
    }

    pub fn remaining_time(&self, secs: u64) {
        self.send(DriverEvent::RemainingTime(secs));
    }

    /// Report the terminal outcome and consume the driver.
    pub fn finish(self, result: Result<(), Error>) {
        self.send(DriverEvent::Finished(result));
    }

    fn send(&self, event: DriverEvent) {
        // The pump only goes away with the transaction; nothing to report
        // to at that point.
        let _ = self.tx.send(event);
    }
}

/// Create a driver channel pair.
#[must_use]
pub fn driver_channel() -> (TransactionDriver, UnboundedReceiver<DriverEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TransactionDriver { tx }, rx)
}

/// Spawn the pump that applies `rx` to `transaction` until a terminal
/// event arrives or the channel closes.
pub fn drive(transaction: Transaction, mut rx: UnboundedReceiver<DriverEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                DriverEvent::Status(status) => transaction.set_status(status),
                DriverEvent::Progress(progress) => transaction.set_progress(progress),
                DriverEvent::Cancellable(cancellable) => transaction.set_cancellable(cancellable),
                DriverEvent::DownloadSpeed(speed) => transaction.set_download_speed(speed),
                DriverEvent::RemainingTime(secs) => transaction.set_remaining_time(secs),
                DriverEvent::Finished(result) => {
                    match result {
                        Ok(()) => transaction.finish(),
                        Err(Error::Cancelled) => {
                            transaction.set_status(TransactionStatus::Cancelled);
                        }
                        Err(error) => transaction.fail(error),
                    }
                    return;
                }
            }
        }
        // Channel closed without a terminal report: the worker is gone.
        if !transaction.status().is_terminal() {
            tracing::warn!(
                resource = %transaction.resource().key(),
                "driver dropped without finishing"
            );
            transaction.fail(TransactionError::DriverGone.into());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgdeck_resources::Resource;
    use pkgdeck_types::{ResourceState, TransactionRole};

    fn transaction() -> Transaction {
        let res = Resource::builder("dummy", "krita")
            .state(ResourceState::Upgradeable)
            .available_version("5.2.0")
            .build();
        Transaction::new(res, TransactionRole::Install)
    }

    #[tokio::test]
    async fn pump_applies_events_in_order() {
        let t = transaction();
        let (driver, rx) = driver_channel();
        let pump = drive(t.clone(), rx);

        driver.status(TransactionStatus::Downloading);
        driver.progress(30);
        driver.download_speed(1024);
        driver.status(TransactionStatus::Committing);
        driver.finish(Ok(()));
        pump.await.expect("pump");

        assert_eq!(t.status(), TransactionStatus::Done);
        assert_eq!(t.resource().state(), ResourceState::Installed);
    }

    #[tokio::test]
    async fn cancelled_outcome_maps_to_cancelled_status() {
        let t = transaction();
        let (driver, rx) = driver_channel();
        let pump = drive(t.clone(), rx);

        driver.status(TransactionStatus::Downloading);
        driver.finish(Err(Error::Cancelled));
        pump.await.expect("pump");

        assert_eq!(t.status(), TransactionStatus::Cancelled);
        // Resource untouched.
        assert_eq!(t.resource().state(), ResourceState::Upgradeable);
    }

    #[tokio::test]
    async fn error_outcome_fails_the_transaction() {
        let t = transaction();
        let (driver, rx) = driver_channel();
        let pump = drive(t.clone(), rx);

        driver.finish(Err(TransactionError::CommitFailed {
            message: "conflicting packages".to_owned(),
        }
        .into()));
        pump.await.expect("pump");

        assert_eq!(t.status(), TransactionStatus::DoneWithError);
        assert!(t.error().is_some());
    }

    #[tokio::test]
    async fn dropped_driver_fails_the_transaction() {
        let t = transaction();
        let (driver, rx) = driver_channel();
        let pump = drive(t.clone(), rx);

        driver.status(TransactionStatus::Downloading);
        drop(driver);
        pump.await.expect("pump");

        assert_eq!(t.status(), TransactionStatus::DoneWithError);
        let error = t.error().expect("error");
        assert!(matches!(
            error,
            Error::Transaction(TransactionError::DriverGone)
        ));
    }
}
