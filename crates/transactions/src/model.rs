//! Process-wide registry of active transactions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use pkgdeck_events::{AppEvent, EventEmitter, EventSender, TransactionEvent};
use pkgdeck_resources::Resource;
use pkgdeck_types::ResourceKey;

use crate::Transaction;

/// What changed on a registered transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionChange {
    Status {
        old: pkgdeck_types::TransactionStatus,
        new: pkgdeck_types::TransactionStatus,
    },
    Progress(u8),
    Cancellable(bool),
    DownloadSpeed(u64),
}

/// Registry notification delivered synchronously to subscribed observers.
pub enum TransactionModelEvent<'a> {
    /// `transaction` entered the registry. When `first` is set the registry
    /// just went from empty to non-empty.
    Added {
        transaction: &'a Transaction,
        first: bool,
    },
    /// A registered transaction changed.
    Changed {
        transaction: &'a Transaction,
        change: TransactionChange,
    },
    /// `transaction` left the registry. When `last` is set the registry
    /// just drained back to empty.
    Removed {
        transaction: &'a Transaction,
        last: bool,
    },
}

/// Handle for unsubscribing an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(usize);

type Observer = Arc<dyn Fn(&TransactionModelEvent<'_>) + Send + Sync>;

pub(crate) struct ModelInner {
    /// Insertion-ordered list, the authoritative membership.
    list: Mutex<Vec<Transaction>>,
    /// Key lookup for `transaction_from_resource`.
    index: DashMap<ResourceKey, Transaction>,
    observers: Mutex<Vec<(usize, Observer)>>,
    next_observer: AtomicUsize,
    events: Option<EventSender>,
}

/// The single registry of active transactions.
///
/// Every transaction a backend creates must pass through here so that any
/// part of the application can enumerate in-flight work. A transaction is
/// a member from [`TransactionModel::add`] until its terminal status
/// transition removes it; removal happens exactly once even if several
/// paths race to report completion.
#[derive(Clone)]
pub struct TransactionModel {
    inner: Arc<ModelInner>,
}

impl Default for TransactionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionModel {
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    #[must_use]
    pub fn with_events(events: EventSender) -> Self {
        Self::build(Some(events))
    }

    fn build(events: Option<EventSender>) -> Self {
        Self {
            inner: Arc::new(ModelInner {
                list: Mutex::new(Vec::new()),
                index: DashMap::new(),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicUsize::new(0),
                events,
            }),
        }
    }

    /// Register a transaction.
    ///
    /// # Panics
    ///
    /// Panics when a transaction for the same resource is already
    /// registered. Backends are responsible for refusing duplicate
    /// operations before constructing a transaction; a duplicate here is a
    /// backend bug worth failing fast on.
    pub fn add(&self, transaction: Transaction) {
        let key = transaction.resource().key().clone();
        assert!(
            !self.inner.index.contains_key(&key),
            "transaction already registered for {key}"
        );
        transaction.attach_model(Arc::downgrade(&self.inner));
        self.inner.index.insert(key.clone(), transaction.clone());

        let first = {
            let mut list = self.inner.list.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            list.push(transaction.clone());
            list.len() == 1
        };

        tracing::debug!(resource = %key, role = ?transaction.role(), "added transaction");
        self.inner.events.emit(AppEvent::Transaction(TransactionEvent::Added {
            resource: key,
            role: transaction.role(),
        }));
        if first {
            self.inner
                .events
                .emit(AppEvent::Transaction(TransactionEvent::FirstStarted));
        }
        self.inner.dispatch(&TransactionModelEvent::Added {
            transaction: &transaction,
            first,
        });

        // The driver may have raced to a terminal status before
        // registration finished; its removal found no registry entry, so
        // sweep the stale one out now.
        if transaction.status().is_terminal() {
            self.inner.remove(&transaction);
        }
    }

    /// The active transaction bound to `resource`, if any.
    #[must_use]
    pub fn transaction_from_resource(&self, resource: &Resource) -> Option<Transaction> {
        self.inner.index.get(resource.key()).map(|t| t.clone())
    }

    /// Snapshot of the registered transactions, in insertion order.
    #[must_use]
    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner
            .list
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .list
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mean progress over the active, visible transactions, or `None` when
    /// no transaction qualifies. Invisible transactions belong to a batch
    /// updater that reports its own aggregate.
    #[must_use]
    pub fn progress(&self) -> Option<u8> {
        let list = self.inner.list.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut sum: u64 = 0;
        let mut count: u64 = 0;
        for transaction in list.iter() {
            if transaction.is_active() && transaction.is_visible() {
                sum += u64::from(transaction.progress());
                count += 1;
            }
        }
        drop(list);
        if count == 0 {
            None
        } else {
            #[allow(clippy::cast_possible_truncation)]
            Some((sum / count) as u8)
        }
    }

    /// Request cancellation of every cancellable registered transaction.
    pub fn cancel_all(&self) {
        for transaction in self.transactions() {
            transaction.cancel();
        }
    }

    /// Subscribe to registry notifications. Observers run synchronously on
    /// the notifying thread and must not call back into the model.
    pub fn subscribe(
        &self,
        observer: impl Fn(&TransactionModelEvent<'_>) + Send + Sync + 'static,
    ) -> ObserverId {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        self.inner
            .observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        ObserverId(id)
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|(observer_id, _)| *observer_id != id.0);
    }
}

impl ModelInner {
    /// Remove a transaction once it reached a terminal status. Idempotent:
    /// racing completion paths make a second call possible, and it must
    /// not re-fire the removal notifications.
    pub(crate) fn remove(&self, transaction: &Transaction) {
        let key = transaction.resource().key();
        let removed_from_index = self
            .index
            .remove_if(key, |_, registered| registered.ptr_eq(transaction))
            .is_some();

        let (removed_from_list, last) = {
            let mut list = self.list.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let before = list.len();
            list.retain(|t| !t.ptr_eq(transaction));
            (list.len() < before, list.is_empty())
        };

        if !removed_from_list {
            if !removed_from_index {
                tracing::warn!(resource = %key, "transaction was already removed");
            }
            return;
        }

        tracing::debug!(resource = %key, status = ?transaction.status(), "removed transaction");
        self.events.emit(AppEvent::Transaction(TransactionEvent::Removed {
            resource: key.clone(),
            status: transaction.status(),
        }));
        if last {
            self.events
                .emit(AppEvent::Transaction(TransactionEvent::AllFinished));
        }
        self.dispatch(&TransactionModelEvent::Removed { transaction, last });
    }

    pub(crate) fn notify_changed(&self, transaction: &Transaction, change: TransactionChange) {
        self.dispatch(&TransactionModelEvent::Changed { transaction, change });
    }

    fn dispatch(&self, event: &TransactionModelEvent<'_>) {
        // Copy the observer list out first so an observer may subscribe or
        // unsubscribe others without deadlocking.
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(event);
        }
    }
}

impl EventEmitter for ModelInner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}
