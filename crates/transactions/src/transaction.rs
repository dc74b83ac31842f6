//! The transaction state machine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use tokio::sync::Notify;

use pkgdeck_errors::{Error, TransactionError};
use pkgdeck_events::{AppEvent, EventEmitter, EventSender, FailureContext, TransactionEvent};
use pkgdeck_resources::Resource;
use pkgdeck_types::{ResourceState, TransactionRole, TransactionStatus};

use crate::model::{ModelInner, TransactionChange};

/// One in-flight install/remove operation against one resource.
///
/// Cheap cloneable handle. Backends create one, register it with the
/// [`crate::TransactionModel`], then push updates through the setters
/// (usually via [`crate::drive`]). Entering a terminal status removes the
/// transaction from the registry and, on success, mutates the bound
/// resource's state; on failure or cancellation the resource is left
/// untouched.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

struct TransactionInner {
    resource: Resource,
    role: TransactionRole,
    state: Mutex<State>,
    cancel_requested: AtomicBool,
    cancel_notify: Notify,
    model: OnceLock<Weak<ModelInner>>,
    events: Option<EventSender>,
}

struct State {
    status: TransactionStatus,
    progress: u8,
    cancellable: bool,
    visible: bool,
    download_speed: u64,
    remaining_time_secs: u64,
    error: Option<Error>,
}

impl Transaction {
    #[must_use]
    pub fn new(resource: Resource, role: TransactionRole) -> Self {
        Self::build(resource, role, None)
    }

    #[must_use]
    pub fn with_events(resource: Resource, role: TransactionRole, events: EventSender) -> Self {
        Self::build(resource, role, Some(events))
    }

    fn build(resource: Resource, role: TransactionRole, events: Option<EventSender>) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                resource,
                role,
                state: Mutex::new(State {
                    status: TransactionStatus::Setup,
                    progress: 0,
                    // Optimistic default; the backend driver reports the
                    // real value once the native layer knows it.
                    cancellable: true,
                    visible: true,
                    download_speed: 0,
                    remaining_time_secs: 0,
                    error: None,
                }),
                cancel_requested: AtomicBool::new(false),
                cancel_notify: Notify::new(),
                model: OnceLock::new(),
                events,
            }),
        }
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    #[must_use]
    pub fn role(&self) -> TransactionRole {
        self.inner.role
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.lock().status
    }

    #[must_use]
    pub fn progress(&self) -> u8 {
        self.lock().progress
    }

    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.lock().cancellable
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Batch-updater transactions are registered invisible so the global
    /// progress row does not double-count them.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    pub fn set_visible(&self, visible: bool) {
        self.lock().visible = visible;
    }

    #[must_use]
    pub fn download_speed(&self) -> u64 {
        self.lock().download_speed
    }

    #[must_use]
    pub fn remaining_time_secs(&self) -> u64 {
        self.lock().remaining_time_secs
    }

    /// Human-readable status line for list delegates.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        self.status().text(self.inner.role)
    }

    /// The error a failed transaction carries, if any.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        self.lock().error.clone()
    }

    /// Push a status transition from the backend driver.
    ///
    /// Entering a terminal status clears cancellability, applies the
    /// success side effect to the resource, and removes the transaction
    /// from the registry (once; later transitions are ignored).
    pub fn set_status(&self, status: TransactionStatus) {
        let old = {
            let mut state = self.lock();
            if state.status == status || state.status.is_terminal() {
                return;
            }
            let old = state.status;
            state.status = status;
            if status.is_terminal() {
                state.cancellable = false;
            }
            old
        };

        self.notify_model(TransactionChange::Status { old, new: status });
        self.emit(TransactionEvent::StatusChanged {
            resource: self.resource().key().clone(),
            role: self.inner.role,
            old,
            new: status,
        });

        if status.is_terminal() {
            self.finalize(status);
        }
    }

    /// Push a progress update (0-100) from the backend driver.
    pub fn set_progress(&self, progress: u8) {
        debug_assert!(progress <= 100, "progress out of range: {progress}");
        let progress = progress.min(100);
        {
            let mut state = self.lock();
            if state.progress == progress {
                return;
            }
            state.progress = progress;
        }
        self.notify_model(TransactionChange::Progress(progress));
        self.emit(TransactionEvent::ProgressChanged {
            resource: self.resource().key().clone(),
            progress,
        });
    }

    /// Mirror the backend-reported cancellability. Never assumed: a driver
    /// that cannot abort its native operation reports `false` and cancel
    /// requests become no-ops.
    pub fn set_cancellable(&self, cancellable: bool) {
        {
            let mut state = self.lock();
            if state.cancellable == cancellable || state.status.is_terminal() {
                return;
            }
            state.cancellable = cancellable;
        }
        self.notify_model(TransactionChange::Cancellable(cancellable));
        self.emit(TransactionEvent::CancellableChanged {
            resource: self.resource().key().clone(),
            cancellable,
        });
    }

    pub fn set_download_speed(&self, bytes_per_second: u64) {
        {
            let mut state = self.lock();
            if state.download_speed == bytes_per_second {
                return;
            }
            state.download_speed = bytes_per_second;
        }
        self.notify_model(TransactionChange::DownloadSpeed(bytes_per_second));
        self.emit(TransactionEvent::DownloadSpeedChanged {
            resource: self.resource().key().clone(),
            bytes_per_second,
        });
    }

    pub fn set_remaining_time(&self, secs: u64) {
        self.lock().remaining_time_secs = secs;
    }

    /// Complete successfully.
    pub fn finish(&self) {
        self.set_status(TransactionStatus::Done);
    }

    /// Complete with an error. The resource state is left untouched; the
    /// error is surfaced as a passive notification payload. A failure
    /// arriving after a terminal status is dropped along with its error.
    pub fn fail(&self, error: Error) {
        {
            let mut state = self.lock();
            if state.status.is_terminal() {
                return;
            }
            state.error = Some(error);
        }
        self.set_status(TransactionStatus::DoneWithError);
    }

    /// Request cancellation.
    ///
    /// Only legal while the backend reports the transaction cancellable;
    /// otherwise this is a silent no-op (the UI is expected to have hidden
    /// the cancel affordance via the cancellable flag).
    pub fn cancel(&self) {
        let refused = {
            let state = self.lock();
            !state.cancellable || state.status.is_terminal()
        };
        if refused {
            let error = Error::from(TransactionError::NotCancellable);
            tracing::debug!(resource = %self.resource().key(), %error, "ignoring cancel request");
            self.inner
                .events
                .emit_debug(format!("{}: {error}", self.resource().key()));
            return;
        }
        self.inner.cancel_requested.store(true, Ordering::Release);
        self.inner.cancel_notify.notify_waiters();
    }

    /// Whether a cancel has been requested. Drivers poll this between
    /// units of native work.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    /// Resolves once cancellation is requested. Drivers select on this
    /// alongside their native completion source.
    pub async fn cancelled(&self) {
        while !self.is_cancel_requested() {
            self.inner.cancel_notify.notified().await;
        }
    }

    /// Same underlying transaction?
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn attach_model(&self, model: Weak<ModelInner>) {
        let _ = self.inner.model.set(model);
    }

    fn finalize(&self, status: TransactionStatus) {
        match status {
            TransactionStatus::Done => match self.inner.role {
                TransactionRole::Install => {
                    let resource = self.resource();
                    resource.set_state(ResourceState::Installed);
                    if let Some(version) = resource.available_version() {
                        resource.set_installed_version(Some(version));
                    }
                }
                TransactionRole::Remove => {
                    let resource = self.resource();
                    resource.set_state(ResourceState::None);
                    resource.set_installed_version(None);
                }
            },
            TransactionStatus::DoneWithError => {
                let failure = self.error().map_or_else(
                    || FailureContext {
                        code: None,
                        message: "operation failed".to_owned(),
                        hint: None,
                        retryable: false,
                    },
                    |e| FailureContext::from_error(&e),
                );
                self.emit(TransactionEvent::Failed {
                    resource: self.resource().key().clone(),
                    role: self.inner.role,
                    failure,
                });
            }
            _ => {}
        }

        if let Some(model) = self.inner.model.get().and_then(Weak::upgrade) {
            model.remove(self);
        }
    }

    fn notify_model(&self, change: TransactionChange) {
        if let Some(model) = self.inner.model.get().and_then(Weak::upgrade) {
            model.notify_changed(self, change);
        }
    }

    fn emit(&self, event: TransactionEvent) {
        self.inner.events.emit(AppEvent::Transaction(event));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Transaction {}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("resource", self.resource().key())
            .field("role", &self.inner.role)
            .field("status", &self.status())
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}
