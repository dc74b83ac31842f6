#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Backend adapters and upgrade coordination
//!
//! A backend is a plugin giving access to one package ecosystem. It owns a
//! resource set, answers search filters with a [`ResultsStream`], creates
//! transactions for install/remove requests, and exposes a
//! [`BackendUpdater`] that coordinates batched upgrades. The
//! [`BackendRegistry`] fans searches out over every registered backend and
//! merges the streams.
//!
//! Native package-manager plumbing is out of scope; it enters through two
//! narrow seams ([`updater::NativeBatch`] for managers that run one batched
//! native transaction, [`updater::BlockingCommit`] for managers with a
//! synchronous database API) and through whatever a [`ResourcesBackend`]
//! implementation does behind its trait surface. [`DummyBackend`] is the
//! in-memory implementation used by tests and the demo CLI.
//!
//! [`ResultsStream`]: pkgdeck_resources::ResultsStream

pub mod backend;
pub mod dummy;
pub mod registry;
pub mod updater;

pub use backend::ResourcesBackend;
pub use dummy::{DummyBackend, DummyPacing};
pub use registry::BackendRegistry;
pub use updater::{
    BackendUpdater, BatchUpdater, BlockingCommit, BlockingDbUpdater, NativeBatch,
    NativeBatchEvent, StandardBackendUpdater, UpgradeItem,
};
