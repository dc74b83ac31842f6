//! Generic upgrade batch coordinator
//!
//! Works for any backend whose upgrades are ordinary per-resource install
//! transactions. The updater snapshots the marked set, launches one
//! invisible transaction per target, aggregates progress and
//! cancellability across them, and detects batch completion through the
//! registry's removal notifications. After the batch it re-queries the
//! backend for a fresh upgradeable set through a normal search stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use chrono::{DateTime, Utc};

use pkgdeck_config::UpdaterConfig;
use pkgdeck_errors::TransactionError;
use pkgdeck_events::{AppEvent, EventEmitter, EventSender, ResourceEvent, UpdateEvent};
use pkgdeck_resources::{Filters, Resource};
use pkgdeck_transactions::{TransactionChange, TransactionModel, TransactionModelEvent};
use pkgdeck_types::UpdaterState;

use crate::backend::ResourcesBackend;
use crate::updater::speed::SpeedBuffer;
use crate::updater::BackendUpdater;

#[derive(Default)]
struct BatchState {
    upgradeable: Vec<Resource>,
    to_upgrade: Vec<Resource>,
    /// Targets whose transaction has started but not reached a terminal
    /// status yet.
    pending: Vec<Resource>,
    /// Batch size at `start()`, the progress denominator.
    total: usize,
    progress: f64,
    progressing: bool,
    cancellable: bool,
    last_update: Option<DateTime<Utc>>,
}

/// Standard per-backend upgrade coordinator.
///
/// Constructed once per backend with a weak reference back to it (the
/// backend owns its updater). Registers itself as a registry observer so
/// transaction completion drives the batch lifecycle without polling.
pub struct StandardBackendUpdater {
    backend: Weak<dyn ResourcesBackend>,
    backend_name: String,
    model: TransactionModel,
    config: UpdaterConfig,
    events: Option<EventSender>,
    state: Mutex<BatchState>,
    speed: Mutex<SpeedBuffer>,
    fetching_updates: AtomicBool,
    weak_self: Weak<Self>,
}

impl StandardBackendUpdater {
    pub fn new(
        backend_name: impl Into<String>,
        backend: Weak<dyn ResourcesBackend>,
        model: TransactionModel,
        config: UpdaterConfig,
        events: Option<EventSender>,
    ) -> Arc<Self> {
        let updater = Arc::new_cyclic(|weak| Self {
            backend,
            backend_name: backend_name.into(),
            model: model.clone(),
            config,
            events,
            state: Mutex::new(BatchState::default()),
            speed: Mutex::new(SpeedBuffer::new(16)),
            fetching_updates: AtomicBool::new(false),
            weak_self: weak.clone(),
        });

        let weak = Arc::downgrade(&updater);
        model.subscribe(move |event| {
            if let Some(updater) = weak.upgrade() {
                updater.on_model_event(event);
            }
        });
        updater
    }

    /// Replace the upgradeable set, e.g. after the backend populated its
    /// catalog. Targets no longer upgradeable are unmarked.
    pub fn set_upgradeable(&self, upgradeable: Vec<Resource>) {
        let mut state = self.lock_state();
        let BatchState {
            upgradeable: current,
            to_upgrade,
            ..
        } = &mut *state;
        *current = upgradeable;
        to_upgrade.retain(|r| current.contains(r));
        state.last_update = Some(Utc::now());
    }

    /// The backend stopped tracking `resource`. Any transaction still
    /// bound to it is failed first, then the resource is dropped from both
    /// sets so the batch cannot reference a gone resource. The removal is
    /// announced on the bus once the invalidation is done.
    pub fn resource_removed(&self, resource: &Resource) {
        if let Some(transaction) = self.model.transaction_from_resource(resource) {
            transaction.fail(
                TransactionError::ResourceGone {
                    resource: resource.key().to_string(),
                }
                .into(),
            );
        }
        let cleanup = {
            let mut state = self.lock_state();
            state.upgradeable.retain(|r| r != resource);
            state.to_upgrade.retain(|r| r != resource);
            let before = state.pending.len();
            state.pending.retain(|r| r != resource);
            state.progressing && before > 0 && state.pending.is_empty()
        };
        self.emit(AppEvent::Resource(ResourceEvent::Removed {
            resource: resource.key().clone(),
        }));
        if cleanup {
            self.cleanup();
        }
    }

    fn on_model_event(&self, event: &TransactionModelEvent<'_>) {
        match event {
            TransactionModelEvent::Changed {
                transaction,
                change,
            } => {
                if !self.tracks(transaction.resource()) {
                    return;
                }
                match change {
                    TransactionChange::Progress(progress) => {
                        self.emit(AppEvent::Update(UpdateEvent::ResourceProgressed {
                            resource: transaction.resource().key().clone(),
                            progress: *progress,
                            state: UpdaterState::from(transaction.status()),
                        }));
                        self.refresh_progress();
                    }
                    TransactionChange::Status { .. } => self.refresh_progress(),
                    TransactionChange::Cancellable(_) => self.refresh_cancellable(),
                    TransactionChange::DownloadSpeed(_) => self.sample_speed(),
                }
            }
            TransactionModelEvent::Removed { transaction, .. } => {
                if self.tracks(transaction.resource()) {
                    self.transaction_removed(transaction.resource());
                }
            }
            TransactionModelEvent::Added { .. } => {}
        }
    }

    fn tracks(&self, resource: &Resource) -> bool {
        resource.backend() == self.backend_name
            && self.lock_state().pending.contains(resource)
    }

    fn transaction_removed(&self, resource: &Resource) {
        let cleanup = {
            let mut state = self.lock_state();
            let before = state.pending.len();
            state.pending.retain(|r| r != resource);
            if state.pending.len() == before {
                return;
            }
            state.progressing && state.pending.is_empty()
        };
        self.refresh_progress();
        if cleanup {
            self.cleanup();
        }
    }

    /// Recompute aggregate progress. Never lowers the published value: a
    /// late or out-of-order per-transaction update must not make the bar
    /// move backwards mid-batch.
    #[allow(clippy::cast_precision_loss)]
    fn refresh_progress(&self) {
        let raised = {
            let mut state = self.lock_state();
            if !state.progressing || state.total == 0 {
                return;
            }
            let completed = state.total - state.pending.len();
            let mut pending_sum: u64 = 0;
            for resource in &state.pending {
                if let Some(transaction) = self.model.transaction_from_resource(resource) {
                    pending_sum += u64::from(transaction.progress());
                }
            }
            let fresh =
                (100.0 * completed as f64 + pending_sum as f64) / state.total as f64;
            if fresh > state.progress {
                state.progress = fresh;
                Some(fresh)
            } else {
                None
            }
        };

        if let Some(progress) = raised {
            let download_speed = self.download_speed();
            self.emit(AppEvent::Update(UpdateEvent::ProgressChanged {
                backend: self.backend_name.clone(),
                progress,
                eta_seconds: self.eta_seconds(),
                download_speed,
            }));
        }
    }

    fn refresh_cancellable(&self) {
        let changed = {
            let mut state = self.lock_state();
            if !state.progressing {
                return;
            }
            let cancellable = state.pending.iter().any(|resource| {
                self.model
                    .transaction_from_resource(resource)
                    .is_some_and(|t| t.is_cancellable())
            });
            if state.cancellable == cancellable {
                None
            } else {
                state.cancellable = cancellable;
                Some(cancellable)
            }
        };
        if let Some(cancellable) = changed {
            self.emit(AppEvent::Update(UpdateEvent::CancellableChanged {
                backend: self.backend_name.clone(),
                cancellable,
            }));
        }
    }

    fn sample_speed(&self) {
        let sum: u64 = {
            let state = self.lock_state();
            state
                .pending
                .iter()
                .filter_map(|resource| self.model.transaction_from_resource(resource))
                .map(|t| t.download_speed())
                .sum()
        };
        self.lock_speed().record(sum, Instant::now());
    }

    /// End-of-batch bookkeeping: clear the marked set, stamp the time, and
    /// kick off an async full re-query of the upgradeable set.
    fn cleanup(&self) {
        {
            let mut state = self.lock_state();
            state.to_upgrade.clear();
            state.pending.clear();
            state.total = 0;
            state.progress = 0.0;
            state.cancellable = false;
            let was_progressing = state.progressing;
            state.progressing = false;
            state.last_update = Some(Utc::now());
            if !was_progressing {
                drop(state);
                self.spawn_refresh();
                return;
            }
        }
        self.lock_speed().clear();
        self.emit(AppEvent::Update(UpdateEvent::ProgressingChanged {
            backend: self.backend_name.clone(),
            progressing: false,
        }));
        self.spawn_refresh();
    }

    fn spawn_refresh(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(backend = %self.backend_name, "no runtime, skipping refresh");
            return;
        };
        let Some(updater) = self.weak_self.upgrade() else {
            return;
        };
        handle.spawn(async move { updater.refresh_upgradeable().await });
    }

    /// Re-query the backend for its current upgradeable set. While a batch
    /// is still progressing the query is deferred on the configured retry
    /// interval; whether that interval matters is a policy question, so it
    /// lives in config rather than being a constant here.
    pub async fn refresh_upgradeable(&self) {
        loop {
            if !self.is_progressing() {
                break;
            }
            tokio::time::sleep(self.config.refresh_retry_interval()).await;
        }

        let Some(backend) = self.backend.upgrade() else {
            return;
        };
        self.fetching_updates.store(true, Ordering::Release);
        self.emit(AppEvent::Update(UpdateEvent::CheckStarted {
            backend: self.backend_name.clone(),
        }));

        let results = backend.search(&Filters::upgradeable()).collect().await;
        let upgradeable: Vec<Resource> = results.into_iter().map(|r| r.resource).collect();
        let updates = upgradeable.len();
        self.set_upgradeable(upgradeable);

        self.fetching_updates.store(false, Ordering::Release);
        self.emit(AppEvent::Update(UpdateEvent::CheckFinished {
            backend: self.backend_name.clone(),
            updates,
        }));
    }

    fn lock_state(&self) -> MutexGuard<'_, BatchState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_speed(&self) -> MutexGuard<'_, SpeedBuffer> {
        self.speed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl BackendUpdater for StandardBackendUpdater {
    fn backend_name(&self) -> &str {
        &self.backend_name
    }

    fn prepare(&self) {
        let mut state = self.lock_state();
        state.to_upgrade = state.upgradeable.clone();
        state.last_update = Some(Utc::now());
        tracing::debug!(
            backend = %self.backend_name,
            targets = state.to_upgrade.len(),
            "prepared upgrade batch"
        );
    }

    fn add_resources(&self, resources: &[Resource]) {
        let mut state = self.lock_state();
        for resource in resources {
            assert!(
                state.upgradeable.contains(resource),
                "marked resource {} is not upgradeable",
                resource.key()
            );
            if !state.to_upgrade.contains(resource) {
                state.to_upgrade.push(resource.clone());
            }
        }
    }

    fn remove_resources(&self, resources: &[Resource]) {
        let mut state = self.lock_state();
        state.to_upgrade.retain(|r| !resources.contains(r));
    }

    fn start(&self) {
        let targets = {
            let mut state = self.lock_state();
            let mut targets = state.to_upgrade.clone();
            targets.sort_by(|a, b| a.display_name().cmp(b.display_name()));
            if targets.is_empty() {
                None
            } else {
                state.pending = targets.clone();
                state.total = targets.len();
                state.progress = 0.0;
                state.progressing = true;
                state.cancellable = false;
                Some(targets)
            }
        };

        let Some(targets) = targets else {
            // Nothing marked: complete straight away instead of sitting in
            // a progressing state no transaction will ever end.
            tracing::debug!(backend = %self.backend_name, "empty batch, cleaning up");
            self.cleanup();
            return;
        };

        self.lock_speed().clear();
        self.emit(AppEvent::Update(UpdateEvent::BatchStarted {
            backend: self.backend_name.clone(),
            targets: targets.len(),
        }));
        self.emit(AppEvent::Update(UpdateEvent::ProgressingChanged {
            backend: self.backend_name.clone(),
            progressing: true,
        }));

        let Some(backend) = self.backend.upgrade() else {
            self.cleanup();
            return;
        };

        let mut cancellable = false;
        for resource in targets {
            match backend.install_application(&resource) {
                Ok(transaction) => {
                    // Invisible: the updater publishes one aggregate row,
                    // the per-item transactions must not be double-counted.
                    transaction.set_visible(false);
                    cancellable |= transaction.is_cancellable();
                    self.model.add(transaction);
                }
                Err(error) => {
                    tracing::error!(
                        backend = %self.backend_name,
                        resource = %resource.key(),
                        %error,
                        "could not start upgrade transaction"
                    );
                    self.emit_error(format!(
                        "Could not upgrade {}: {error}",
                        resource.display_name()
                    ));
                    self.lock_state().pending.retain(|r| r != &resource);
                }
            }
        }

        let changed = {
            let mut state = self.lock_state();
            if state.cancellable == cancellable {
                false
            } else {
                state.cancellable = cancellable;
                true
            }
        };
        if changed {
            self.emit(AppEvent::Update(UpdateEvent::CancellableChanged {
                backend: self.backend_name.clone(),
                cancellable,
            }));
        }

        // Every target may have failed to even start.
        let drained = {
            let state = self.lock_state();
            state.progressing && state.pending.is_empty()
        };
        if drained {
            self.cleanup();
        }
    }

    fn cancel(&self) {
        let transactions: Vec<_> = {
            let state = self.lock_state();
            state
                .pending
                .iter()
                .filter_map(|resource| self.model.transaction_from_resource(resource))
                .collect()
        };
        self.emit(AppEvent::Update(UpdateEvent::CancelRequested {
            backend: self.backend_name.clone(),
        }));
        for transaction in transactions {
            transaction.cancel();
        }
    }

    fn is_cancellable(&self) -> bool {
        self.lock_state().cancellable
    }

    fn is_progressing(&self) -> bool {
        self.lock_state().progressing
    }

    fn progress(&self) -> f64 {
        self.lock_state().progress
    }

    fn is_fetching_updates(&self) -> bool {
        self.fetching_updates.load(Ordering::Acquire)
            || self
                .backend
                .upgrade()
                .is_some_and(|backend| backend.is_fetching())
    }

    fn updates_count(&self) -> usize {
        self.lock_state().upgradeable.len()
    }

    fn update_size(&self) -> u64 {
        self.lock_state().to_upgrade.iter().map(Resource::size).sum()
    }

    fn download_speed(&self) -> u64 {
        self.lock_speed().smoothed()
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn eta_seconds(&self) -> Option<u64> {
        let speed = self.download_speed();
        if speed == 0 {
            return None;
        }
        let (progress, size) = {
            let state = self.lock_state();
            if !state.progressing {
                return None;
            }
            let size: u64 = state.to_upgrade.iter().map(Resource::size).sum();
            (state.progress, size)
        };
        let remaining = size as f64 * (100.0 - progress) / 100.0;
        Some((remaining / speed as f64).ceil() as u64)
    }

    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.lock_state().last_update
    }

    fn upgradeable(&self) -> Vec<Resource> {
        self.lock_state().upgradeable.clone()
    }

    fn to_upgrade(&self) -> Vec<Resource> {
        self.lock_state().to_upgrade.clone()
    }
}

impl EventEmitter for StandardBackendUpdater {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}
