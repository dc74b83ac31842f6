//! Fan-in aggregation over several results streams

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use futures::stream::FuturesUnordered;
use futures::StreamExt;

use pkgdeck_types::ResourceKey;

use crate::{ResultsStream, StreamResult};

type ChildFuture = Pin<Box<dyn Future<Output = (Option<Vec<StreamResult>>, ResultsStream)> + Send>>;

fn pull(mut stream: ResultsStream) -> ChildFuture {
    Box::pin(async move {
        let batch = stream.next_batch().await;
        (batch, stream)
    })
}

/// Aggregates N child streams into one stream that finishes exactly once,
/// after every child has finished.
///
/// Batches are forwarded as they arrive from whichever child produced them
/// (no cross-child ordering), deduplicated by resource key with first-seen
/// winning. The materialized union additionally collapses entries sharing
/// an appstream id: the preferred application backend's copy replaces a
/// non-preferred one, otherwise the first seen stays.
pub struct StoredResultsStream {
    pending: FuturesUnordered<ChildFuture>,
    seen: HashMap<ResourceKey, usize>,
    by_appstream: HashMap<String, usize>,
    results: Vec<StreamResult>,
    preferred_backend: Option<String>,
}

impl StoredResultsStream {
    /// Wrap `children`; an empty list finishes immediately with no results.
    #[must_use]
    pub fn new(children: Vec<ResultsStream>) -> Self {
        let pending: FuturesUnordered<ChildFuture> = FuturesUnordered::new();
        for child in children {
            pending.push(pull(child));
        }
        Self {
            pending,
            seen: HashMap::new(),
            by_appstream: HashMap::new(),
            results: Vec::new(),
            preferred_backend: None,
        }
    }

    /// Prefer this backend's copy when several backends report the same
    /// appstream id.
    #[must_use]
    pub fn with_preferred_backend(mut self, backend: Option<String>) -> Self {
        self.preferred_backend = backend;
        self
    }

    /// Next deduplicated batch, or `None` once all children have finished.
    pub async fn next_batch(&mut self) -> Option<Vec<StreamResult>> {
        while let Some((batch, child)) = self.pending.next().await {
            match batch {
                Some(batch) => {
                    self.pending.push(pull(child));
                    let fresh = self.absorb(batch);
                    if !fresh.is_empty() {
                        return Some(fresh);
                    }
                    // Batch was all duplicates; keep pulling.
                }
                // Child finished: drop it and wait for the rest.
                None => {}
            }
        }
        None
    }

    /// Drive all children to completion and return the materialized,
    /// deduplicated union of their batches.
    pub async fn collect(mut self) -> Vec<StreamResult> {
        while self.next_batch().await.is_some() {}
        self.results
    }

    /// Everything absorbed so far.
    #[must_use]
    pub fn results(&self) -> &[StreamResult] {
        &self.results
    }

    /// Merge a batch into the materialized set, returning the entries that
    /// were actually new (and therefore worth forwarding).
    fn absorb(&mut self, batch: Vec<StreamResult>) -> Vec<StreamResult> {
        let mut fresh = Vec::with_capacity(batch.len());
        for result in batch {
            if self.seen.contains_key(result.resource.key()) {
                continue;
            }

            if let Some(id) = result.resource.appstream_id().map(str::to_owned) {
                if let Some(&idx) = self.by_appstream.get(&id) {
                    // Same logical application from another backend. The
                    // preferred backend's copy wins; replacement updates
                    // the materialized set but is not re-forwarded.
                    let existing_preferred = self
                        .preferred_backend
                        .as_deref()
                        .is_some_and(|p| self.results[idx].resource.backend() == p);
                    let new_preferred = self
                        .preferred_backend
                        .as_deref()
                        .is_some_and(|p| result.resource.backend() == p);
                    if new_preferred && !existing_preferred {
                        self.seen.insert(result.resource.key().clone(), idx);
                        self.results[idx] = result;
                    }
                    continue;
                }
                self.by_appstream.insert(id, self.results.len());
            }

            self.seen
                .insert(result.resource.key().clone(), self.results.len());
            self.results.push(result.clone());
            fresh.push(result);
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resource;
    use pkgdeck_types::ResourceState;

    fn result(backend: &str, name: &str) -> StreamResult {
        StreamResult::new(Resource::builder(backend, name).build())
    }

    fn result_with_id(backend: &str, name: &str, appstream: &str) -> StreamResult {
        StreamResult::new(
            Resource::builder(backend, name)
                .appstream_id(appstream)
                .state(ResourceState::None)
                .build(),
        )
    }

    #[tokio::test]
    async fn zero_children_finishes_immediately_with_empty_set() {
        let stored = StoredResultsStream::new(Vec::new());
        let all = stored.collect().await;
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn finishes_once_after_all_children() {
        let a = ResultsStream::from_results("a", vec![result("x", "one"), result("x", "two")]);
        let b = ResultsStream::from_results("b", vec![result("y", "three")]);
        let c = ResultsStream::empty("c");

        let mut stored = StoredResultsStream::new(vec![a, b, c]);
        let mut total = 0;
        while let Some(batch) = stored.next_batch().await {
            total += batch.len();
        }
        assert_eq!(total, 3);
        // Spent: further polls keep reporting completion.
        assert!(stored.next_batch().await.is_none());
        assert_eq!(stored.results().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_keys_across_children_are_collapsed() {
        // {res1, res2} and {res2, res3} collapse to {res1, res2, res3}.
        let a = ResultsStream::from_results("a", vec![result("x", "res1"), result("x", "res2")]);
        let b = ResultsStream::from_results("b", vec![result("x", "res2"), result("x", "res3")]);

        let all = StoredResultsStream::new(vec![a, b]).collect().await;
        let mut names: Vec<&str> = all.iter().map(|r| r.resource.package_name()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["res1", "res2", "res3"]);
    }

    #[tokio::test]
    async fn appstream_duplicates_prefer_the_application_backend() {
        let snap = ResultsStream::from_results(
            "snap",
            vec![result_with_id("snap", "krita", "org.kde.krita")],
        );
        let pk = ResultsStream::from_results(
            "packagekit",
            vec![result_with_id("packagekit", "krita", "org.kde.krita")],
        );

        let all = StoredResultsStream::new(vec![snap, pk])
            .with_preferred_backend(Some("packagekit".to_owned()))
            .collect()
            .await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].resource.backend(), "packagekit");
    }

    #[tokio::test]
    async fn appstream_duplicates_without_preference_keep_first_seen() {
        let a = ResultsStream::from_results(
            "a",
            vec![result_with_id("a", "krita", "org.kde.krita")],
        );
        let b = ResultsStream::from_results(
            "b",
            vec![result_with_id("b", "krita", "org.kde.krita")],
        );

        // Deterministic because child "a" is registered (and polled) first
        // and both children are pre-seeded.
        let all = StoredResultsStream::new(vec![a, b]).collect().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].resource.backend(), "a");
    }

    #[tokio::test]
    async fn children_with_zero_batches_still_count_towards_completion() {
        let (handle_a, a) = ResultsStream::channel("a");
        let (mut handle_b, b) = ResultsStream::channel("b");

        let task = tokio::spawn(StoredResultsStream::new(vec![a, b]).collect());

        handle_b.send(vec![result("x", "only")]);
        drop(handle_b);
        drop(handle_a);

        let all = task.await.expect("join");
        assert_eq!(all.len(), 1);
    }
}
