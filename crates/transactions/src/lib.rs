#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Transaction state machine and process-wide registry
//!
//! A [`Transaction`] is one in-flight install/remove operation against one
//! resource. It performs no backend I/O itself: a backend-specific driver
//! pushes status and progress through the [`driver`] channel and the
//! transaction stores and republishes them. The [`TransactionModel`] is the
//! single registry of active transactions; terminal transitions remove a
//! transaction from it exactly once.

pub mod driver;
pub mod model;
pub mod transaction;

pub use driver::{driver_channel, drive, DriverEvent, TransactionDriver};
pub use model::{ObserverId, TransactionChange, TransactionModel, TransactionModelEvent};
pub use transaction::Transaction;
