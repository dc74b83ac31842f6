#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Shared vocabulary types for the pkgdeck software-center core
//!
//! This crate holds the enums and identifiers every other crate speaks:
//! resource install states, transaction roles and statuses, and the
//! backend-scoped resource key. It deliberately carries no behavior beyond
//! cheap derived accessors so that it can sit at the bottom of the
//! dependency graph.

pub mod resource;
pub mod transaction;

pub use resource::{ResourceKey, ResourceKind, ResourceState};
pub use transaction::{TransactionRole, TransactionStatus, UpdaterState};
