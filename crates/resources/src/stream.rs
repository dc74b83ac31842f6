//! Single-backend search result streams

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use pkgdeck_events::{AppEvent, EventEmitter, EventSender, SearchEvent};
use pkgdeck_types::ResourceKey;

use crate::Resource;

/// One search hit with its backend-assigned relevance score.
#[derive(Debug, Clone)]
pub struct StreamResult {
    pub resource: Resource,
    pub sort_score: u32,
}

impl StreamResult {
    #[must_use]
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            sort_score: 0,
        }
    }

    #[must_use]
    pub fn with_score(resource: Resource, sort_score: u32) -> Self {
        Self {
            resource,
            sort_score,
        }
    }
}

impl PartialEq for StreamResult {
    fn eq(&self, other: &Self) -> bool {
        self.resource == other.resource
    }
}

impl Eq for StreamResult {}

/// Producer side of a [`ResultsStream`].
///
/// Dropping the handle *is* the completion signal: whatever path the
/// backend call takes (success, error, early return), the stream always
/// finishes. Batches that only contain resources already delivered by this
/// handle are silently dropped, so a stream never repeats an entry.
pub struct ResultsStreamHandle {
    tx: UnboundedSender<Vec<StreamResult>>,
    seen: HashSet<ResourceKey>,
    name: String,
    delivered: usize,
    opened: Instant,
    slow_threshold: Duration,
    events: Option<EventSender>,
}

impl ResultsStreamHandle {
    /// Deliver a batch of results. Entries this stream already delivered
    /// are filtered out; empty batches are not sent.
    pub fn send(&mut self, batch: Vec<StreamResult>) {
        let fresh: Vec<StreamResult> = batch
            .into_iter()
            .filter(|result| self.seen.insert(result.resource.key().clone()))
            .collect();
        if fresh.is_empty() {
            return;
        }
        self.delivered += fresh.len();
        // A send error means the consumer lost interest; that is fine.
        let _ = self.tx.send(fresh);
    }

    /// Explicitly finish the stream. Equivalent to dropping the handle.
    pub fn finish(self) {}
}

impl Drop for ResultsStreamHandle {
    fn drop(&mut self) {
        let elapsed = self.opened.elapsed();
        if elapsed > self.slow_threshold {
            tracing::debug!(stream = %self.name, ?elapsed, "stream took really long");
            self.events.emit(AppEvent::Search(SearchEvent::StreamSlow {
                name: self.name.clone(),
                elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            }));
        }
        self.events
            .emit(AppEvent::Search(SearchEvent::StreamFinished {
                name: self.name.clone(),
                results: self.delivered,
            }));
    }
}

/// A one-shot, asynchronous search result channel from one backend call.
///
/// Consumers call [`ResultsStream::next_batch`] until it yields `None`;
/// after that the stream is spent and should be dropped.
pub struct ResultsStream {
    name: String,
    rx: UnboundedReceiver<Vec<StreamResult>>,
}

impl ResultsStream {
    /// Open a stream with default diagnostics (no event bus, 5s slow
    /// threshold).
    #[must_use]
    pub fn channel(name: impl Into<String>) -> (ResultsStreamHandle, Self) {
        Self::channel_with(name, None, Duration::from_secs(5))
    }

    /// Open a stream wired to the event bus.
    #[must_use]
    pub fn channel_with(
        name: impl Into<String>,
        events: Option<EventSender>,
        slow_threshold: Duration,
    ) -> (ResultsStreamHandle, Self) {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        events.emit(AppEvent::Search(SearchEvent::StreamStarted {
            name: name.clone(),
        }));
        let handle = ResultsStreamHandle {
            tx,
            seen: HashSet::new(),
            name: name.clone(),
            delivered: 0,
            opened: Instant::now(),
            slow_threshold,
            events,
        };
        (handle, Self { name, rx })
    }

    /// A stream whose entire content is known up front: the seed batch is
    /// replayed to the consumer and the stream finishes immediately.
    #[must_use]
    pub fn from_results(name: impl Into<String>, results: Vec<StreamResult>) -> Self {
        let (mut handle, stream) = Self::channel(name);
        handle.send(results);
        stream
    }

    /// A stream that finishes immediately without results.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self::from_results(name, Vec::new())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive the next result batch, or `None` once the stream finished.
    /// Batches arrive in the order the backend produced them.
    pub async fn next_batch(&mut self) -> Option<Vec<StreamResult>> {
        self.rx.recv().await
    }

    /// Drain the stream to completion, collecting every result.
    pub async fn collect(mut self) -> Vec<StreamResult> {
        let mut all = Vec::new();
        while let Some(batch) = self.next_batch().await {
            all.extend(batch);
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgdeck_types::ResourceState;

    fn result(name: &str) -> StreamResult {
        StreamResult::new(
            Resource::builder("dummy", name)
                .state(ResourceState::None)
                .build(),
        )
    }

    #[tokio::test]
    async fn seeded_stream_replays_then_finishes() {
        let mut stream =
            ResultsStream::from_results("seeded", vec![result("a"), result("b")]);
        let batch = stream.next_batch().await.expect("seed batch");
        assert_eq!(batch.len(), 2);
        assert!(stream.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn empty_stream_finishes_without_batches() {
        let mut stream = ResultsStream::empty("empty");
        assert!(stream.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_handle_finishes_the_stream() {
        let (mut handle, mut stream) = ResultsStream::channel("incremental");
        handle.send(vec![result("a")]);
        drop(handle);

        assert_eq!(stream.next_batch().await.expect("batch").len(), 1);
        assert!(stream.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn later_batches_never_repeat_earlier_entries() {
        let (mut handle, stream) = ResultsStream::channel("dedup");
        handle.send(vec![result("a"), result("b")]);
        handle.send(vec![result("b"), result("c")]);
        drop(handle);

        let all = stream.collect().await;
        let names: Vec<&str> = all.iter().map(|r| r.resource.package_name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn fully_duplicate_batch_is_not_delivered() {
        let (mut handle, mut stream) = ResultsStream::channel("dedup2");
        handle.send(vec![result("a")]);
        handle.send(vec![result("a")]);
        drop(handle);

        assert_eq!(stream.next_batch().await.expect("batch").len(), 1);
        // The second send was entirely duplicates, so the next recv is the
        // completion, not an empty batch.
        assert!(stream.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn finish_event_reports_delivered_count() {
        let (tx, mut rx) = pkgdeck_events::channel();
        let (mut handle, _stream) =
            ResultsStream::channel_with("counted", Some(tx), Duration::from_secs(5));
        handle.send(vec![result("a"), result("b")]);
        handle.finish();

        let mut finished = None;
        while let Ok(message) = rx.try_recv() {
            if let AppEvent::Search(SearchEvent::StreamFinished { results, .. }) = message.event {
                finished = Some(results);
            }
        }
        assert_eq!(finished, Some(2));
    }
}
