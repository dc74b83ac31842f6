#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Resource entities and search result streams for pkgdeck
//!
//! A [`Resource`] is one installable or installed software item reported by
//! exactly one backend. Searches answer with a [`ResultsStream`]: a one-shot
//! channel delivering zero or more result batches followed by exactly one
//! completion. [`StoredResultsStream`] fans N of those in, deduplicates, and
//! completes exactly once after all children have.

pub mod filters;
pub mod resource;
pub mod stored;
pub mod stream;

pub use filters::Filters;
pub use resource::{Resource, ResourceBuilder};
pub use stored::StoredResultsStream;
pub use stream::{ResultsStream, ResultsStreamHandle, StreamResult};
