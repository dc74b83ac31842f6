use serde::{Deserialize, Serialize};

use crate::{EventLevel, EventSource};
use pkgdeck_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Optional stable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self {
            code: error.user_code().map(str::to_owned),
            message: error.user_message().into_owned(),
            hint: error.user_hint().map(str::to_owned),
            retryable: error.is_retryable(),
        }
    }
}

pub mod general;
pub mod resource;
pub mod search;
pub mod transaction;
pub mod update;

pub use general::GeneralEvent;
pub use resource::ResourceEvent;
pub use search::SearchEvent;
pub use transaction::TransactionEvent;
pub use update::UpdateEvent;

/// Top-level application event enum that aggregates all domain events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, passive messages)
    General(GeneralEvent),

    /// Transaction lifecycle events (registry add/remove, status, progress)
    Transaction(TransactionEvent),

    /// Resource state notifications
    Resource(ResourceEvent),

    /// Search stream lifecycle events
    Search(SearchEvent),

    /// Updater batch coordination events
    Update(UpdateEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Transaction(_) => EventSource::TRANSACTION,
            Self::Resource(_) => EventSource::RESOURCE,
            Self::Search(_) => EventSource::SEARCH,
            Self::Update(_) => EventSource::UPDATE,
        }
    }

    /// The severity this event is stamped with on the bus. High-frequency
    /// progress traffic stays at debug so log consumers can filter it.
    #[must_use]
    pub fn level(&self) -> EventLevel {
        match self {
            Self::General(event) => match event {
                GeneralEvent::Error { .. } => EventLevel::Error,
                GeneralEvent::Warning { .. } => EventLevel::Warn,
                GeneralEvent::PassiveMessage { .. } => EventLevel::Info,
                GeneralEvent::DebugLog { .. }
                | GeneralEvent::OperationStarted { .. }
                | GeneralEvent::OperationCompleted { .. } => EventLevel::Debug,
            },
            Self::Transaction(TransactionEvent::Failed { .. }) => EventLevel::Error,
            Self::Transaction(
                TransactionEvent::ProgressChanged { .. }
                | TransactionEvent::DownloadSpeedChanged { .. },
            )
            | Self::Update(
                UpdateEvent::ProgressChanged { .. } | UpdateEvent::ResourceProgressed { .. },
            ) => EventLevel::Debug,
            Self::Search(SearchEvent::StreamSlow { .. }) => EventLevel::Warn,
            _ => EventLevel::Info,
        }
    }

    /// Identifier used to stitch related events together: the resource key
    /// for per-resource events, the backend or stream name otherwise.
    #[must_use]
    pub fn correlation(&self) -> Option<String> {
        match self {
            Self::General(_) => None,
            Self::Transaction(event) => match event {
                TransactionEvent::Added { resource, .. }
                | TransactionEvent::StatusChanged { resource, .. }
                | TransactionEvent::ProgressChanged { resource, .. }
                | TransactionEvent::CancellableChanged { resource, .. }
                | TransactionEvent::DownloadSpeedChanged { resource, .. }
                | TransactionEvent::Removed { resource, .. }
                | TransactionEvent::Failed { resource, .. } => Some(resource.to_string()),
                TransactionEvent::FirstStarted | TransactionEvent::AllFinished => None,
            },
            Self::Resource(
                ResourceEvent::StateChanged { resource, .. }
                | ResourceEvent::Removed { resource },
            ) => Some(resource.to_string()),
            Self::Search(
                SearchEvent::StreamStarted { name }
                | SearchEvent::StreamSlow { name, .. }
                | SearchEvent::StreamFinished { name, .. },
            ) => Some(name.clone()),
            Self::Update(event) => match event {
                UpdateEvent::CheckStarted { backend }
                | UpdateEvent::CheckFinished { backend, .. }
                | UpdateEvent::BatchStarted { backend, .. }
                | UpdateEvent::ProgressingChanged { backend, .. }
                | UpdateEvent::ProgressChanged { backend, .. }
                | UpdateEvent::CancellableChanged { backend, .. }
                | UpdateEvent::CancelRequested { backend } => Some(backend.clone()),
                UpdateEvent::ResourceProgressed { resource, .. } => Some(resource.to_string()),
            },
        }
    }
}
