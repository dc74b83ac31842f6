//! Adapter for backends that upgrade through one native batched
//! transaction
//!
//! PackageKit-style managers take the whole target list in a single
//! native call and report progress per item plus batch-wide signals. The
//! core still wants one transaction per resource, so this adapter fans the
//! native event stream out to the per-resource drivers. Cancellability is
//! whatever the native layer last reported, mirrored to every driver; it
//! is never assumed.

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use pkgdeck_errors::{Error, TransactionError};
use pkgdeck_transactions::TransactionDriver;
use pkgdeck_types::TransactionStatus;

/// One signal from the native batched transaction.
#[derive(Debug)]
pub enum NativeBatchEvent {
    /// A specific package changed phase.
    ItemStatus {
        name: String,
        status: TransactionStatus,
    },
    /// Per-package percentage.
    ItemPercent { name: String, percent: u8 },
    /// Whole-batch percentage; applied to items that have not reported
    /// their own number yet.
    OverallPercent(u8),
    /// The native layer's allow-cancel flag flipped.
    AllowCancel(bool),
    /// Batch-wide download speed, bytes/sec.
    Speed(u64),
    /// The whole batch committed successfully.
    Finished,
    /// The whole batch failed.
    Failed { message: String },
    /// Policy rejected the operation before anything was committed.
    AuthorizationDenied,
    /// The native layer honoured a cancel request.
    CancelledByUser,
}

/// The native seam: run one batched transaction over `targets` (package
/// names), streaming [`NativeBatchEvent`]s until a terminal one.
pub trait NativeBatch: Send + Sync {
    fn run(&self, targets: Vec<String>) -> UnboundedReceiver<NativeBatchEvent>;

    /// Best-effort abort of the running batch. Only called after the
    /// native layer reported `AllowCancel(true)`.
    fn cancel(&self);
}

/// Fans one native batch out to per-resource transaction drivers.
pub struct BatchUpdater;

impl BatchUpdater {
    /// Pump native events into `drivers` (package name to driver) until a
    /// terminal event or the native stream ends. Consumes the drivers:
    /// every one is finished exactly once.
    pub fn run(
        mut events: UnboundedReceiver<NativeBatchEvent>,
        mut drivers: HashMap<String, TransactionDriver>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            // Items that reported their own percentage stop following the
            // overall number.
            let mut item_reported: HashMap<String, bool> =
                drivers.keys().map(|name| (name.clone(), false)).collect();

            while let Some(event) = events.recv().await {
                match event {
                    NativeBatchEvent::ItemStatus { name, status } => {
                        if let Some(driver) = drivers.get(&name) {
                            driver.status(status);
                        }
                    }
                    NativeBatchEvent::ItemPercent { name, percent } => {
                        if let Some(driver) = drivers.get(&name) {
                            item_reported.insert(name, true);
                            driver.progress(percent);
                        }
                    }
                    NativeBatchEvent::OverallPercent(percent) => {
                        for (name, driver) in &drivers {
                            if !item_reported.get(name).copied().unwrap_or(false) {
                                driver.progress(percent);
                            }
                        }
                    }
                    NativeBatchEvent::AllowCancel(allow) => {
                        for driver in drivers.values() {
                            driver.cancellable(allow);
                        }
                    }
                    NativeBatchEvent::Speed(bytes_per_second) => {
                        for driver in drivers.values() {
                            driver.download_speed(bytes_per_second);
                        }
                    }
                    NativeBatchEvent::Finished => {
                        for (_, driver) in drivers.drain() {
                            driver.finish(Ok(()));
                        }
                        return;
                    }
                    NativeBatchEvent::Failed { message } => {
                        for (_, driver) in drivers.drain() {
                            driver.finish(Err(TransactionError::CommitFailed {
                                message: message.clone(),
                            }
                            .into()));
                        }
                        return;
                    }
                    NativeBatchEvent::AuthorizationDenied => {
                        for (_, driver) in drivers.drain() {
                            driver
                                .finish(Err(TransactionError::AuthorizationDenied.into()));
                        }
                        return;
                    }
                    NativeBatchEvent::CancelledByUser => {
                        for (_, driver) in drivers.drain() {
                            driver.finish(Err(Error::Cancelled));
                        }
                        return;
                    }
                }
            }

            // Native stream ended without a terminal event; fail whatever
            // is left rather than stranding the transactions.
            tracing::warn!("native batch ended without a terminal event");
            for (_, driver) in drivers.drain() {
                driver.finish(Err(TransactionError::DriverGone.into()));
            }
        })
    }
}
