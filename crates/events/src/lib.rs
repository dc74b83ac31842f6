#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in pkgdeck
//!
//! All observable activity in the core flows through this bus: transaction
//! state changes, resource state flips, search stream lifecycles, and
//! updater batch progress. Presentation layers (the CLI shell, a GUI)
//! subscribe to the receiving end; core crates never print or log
//! user-facing text directly.
//!
//! ## Architecture
//!
//! - **Domain-driven events**: grouped by functional domain (Transaction,
//!   Resource, Search, Update, General)
//! - **Unified `EventEmitter` trait**: one API whether you hold a raw
//!   sender or a struct containing one
//! - **Passive failure surfacing**: errors become `FailureContext`
//!   payloads, never modal interruptions

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{
    AppEvent, FailureContext, GeneralEvent, ResourceEvent, SearchEvent, TransactionEvent,
    UpdateEvent,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// One bus message: the domain event plus metadata captured at emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: AppEvent,
}

/// Type alias for the event sender
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout pkgdeck
///
/// Emission is fire-and-forget: if the receiving end is gone the event is
/// dropped, never blocking or failing the operation that produced it.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter, stamping it with metadata
    /// derived from the event itself.
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            let mut meta = EventMeta::new(event.level(), event.event_source());
            if let Some(correlation) = event.correlation() {
                meta = meta.with_correlation_id(correlation);
            }
            let _ = sender.send(EventMessage { meta, event });
        }
    }

    /// Emit a debug log event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit a passive, non-blocking user notification
    fn emit_passive_message(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::PassiveMessage {
            message: message.into(),
        }));
    }

    /// Emit an operation started event
    fn emit_operation_started(&self, operation: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationStarted {
            operation: operation.into(),
        }));
    }

    /// Emit an operation completed event
    fn emit_operation_completed(&self, operation: impl Into<String>, success: bool) {
        self.emit(AppEvent::General(GeneralEvent::OperationCompleted {
            operation: operation.into(),
            success,
        }));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

/// Implementation for an optional sender, the shape most core structs carry
impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}
