//! Result sinks and the decorators combinators wrap around them.
//!
//! A sink is the only state shared between concurrently running branches, so
//! every implementation here is safe for concurrent `send` calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::permissions::PermissionChecker;
use crate::result::{SearchEvent, SearchMatch};

/// Destination for streamed match batches.
///
/// `send` may wait to apply backpressure.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn send(&self, event: SearchEvent);
}

#[async_trait]
impl<S: ResultSink + ?Sized> ResultSink for Arc<S> {
    async fn send(&self, event: SearchEvent) {
        (**self).send(event).await
    }
}

/// Sink backed by a bounded channel.
pub struct ChannelSink {
    tx: mpsc::Sender<SearchEvent>,
    closed: AtomicBool,
}

impl ChannelSink {
    /// Create a sink and the stream its events come out of. At most
    /// `capacity` batches are buffered before senders wait.
    pub fn new(capacity: usize) -> (Self, ReceiverStream<SearchEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                closed: AtomicBool::new(false),
            },
            ReceiverStream::new(rx),
        )
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn send(&self, event: SearchEvent) {
        if event.is_empty() {
            return;
        }
        if self.tx.send(event).await.is_err() && !self.closed.swap(true, Ordering::Relaxed) {
            tracing::warn!("Result consumer went away; discarding further matches");
        }
    }
}

/// Sink that keeps every match in memory.
#[derive(Default)]
pub struct CollectSink {
    matches: Mutex<Vec<SearchMatch>>,
    batches: AtomicUsize,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far, in arrival order.
    pub async fn matches(&self) -> Vec<SearchMatch> {
        self.matches.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.matches.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.lock().await.is_empty()
    }

    /// Number of non-empty batches received.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResultSink for CollectSink {
    async fn send(&self, event: SearchEvent) {
        if event.is_empty() {
            return;
        }
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.matches.lock().await.extend(event.matches);
    }
}

/// Forwards at most `limit` matches, then cancels the branch feeding it.
pub struct LimitSink<'a> {
    inner: &'a dyn ResultSink,
    limit: usize,
    sent: AtomicUsize,
    truncated: AtomicBool,
    cancel: CancellationToken,
}

impl<'a> LimitSink<'a> {
    pub fn new(inner: &'a dyn ResultSink, limit: usize, cancel: CancellationToken) -> Self {
        Self {
            inner,
            limit,
            sent: AtomicUsize::new(0),
            truncated: AtomicBool::new(false),
            cancel,
        }
    }

    /// Whether the cap has been reached.
    pub fn limit_hit(&self) -> bool {
        self.sent.load(Ordering::Acquire) >= self.limit
    }

    /// Reserve room for up to `wanted` matches, returning how many fit.
    /// Whether any match was dropped because the cap had been reached.
    pub fn truncated(&self) -> bool {
        self.truncated.load(Ordering::Acquire)
    }

    fn reserve(&self, wanted: usize) -> usize {
        let limit = self.limit;
        match self
            .sent
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |sent| {
                (sent < limit).then(|| (sent + wanted).min(limit))
            }) {
            Ok(prev) => wanted.min(limit - prev),
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl<'a> ResultSink for LimitSink<'a> {
    async fn send(&self, mut event: SearchEvent) {
        let take = self.reserve(event.len());
        if take < event.len() {
            self.truncated.store(true, Ordering::Release);
        }
        if take > 0 {
            event.matches.truncate(take);
            self.inner.send(event).await;
        }
        if self.limit_hit() && !self.cancel.is_cancelled() {
            tracing::debug!(limit = self.limit, "Result limit reached, cancelling branch");
            self.cancel.cancel();
        }
    }
}

/// Drops matches the viewer is not permitted to see.
pub struct FilterSink<'a> {
    inner: &'a dyn ResultSink,
    checker: &'a dyn PermissionChecker,
}

impl<'a> FilterSink<'a> {
    pub fn new(inner: &'a dyn ResultSink, checker: &'a dyn PermissionChecker) -> Self {
        Self { inner, checker }
    }
}

#[async_trait]
impl<'a> ResultSink for FilterSink<'a> {
    async fn send(&self, mut event: SearchEvent) {
        let before = event.len();
        event.matches.retain(|m| self.checker.allowed(m));
        let dropped = before - event.len();
        if dropped > 0 {
            tracing::trace!(dropped, "Filtered matches hidden by sub-repo permissions");
        }
        if !event.is_empty() {
            self.inner.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use super::*;
    use crate::permissions::SubRepoPermissions;

    fn paths(n: usize) -> SearchEvent {
        (0..n)
            .map(|i| SearchMatch::path("acme/api", format!("f{i}.rs")))
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn limit_truncates_crossing_batch_and_cancels() {
        let collect = CollectSink::new();
        let token = CancellationToken::new();
        let limit = LimitSink::new(&collect, 3, token.clone());

        limit.send(paths(2)).await;
        assert!(!token.is_cancelled());
        limit.send(paths(2)).await;
        assert!(token.is_cancelled());
        assert!(limit.limit_hit());
        assert!(limit.truncated());
        limit.send(paths(5)).await;

        assert_eq!(collect.len().await, 3);
    }

    #[tokio::test]
    async fn limit_reached_exactly_is_not_truncated() {
        let collect = CollectSink::new();
        let token = CancellationToken::new();
        let limit = LimitSink::new(&collect, 3, token.clone());

        limit.send(paths(3)).await;

        assert!(limit.limit_hit());
        assert!(token.is_cancelled());
        assert!(!limit.truncated());
        assert_eq!(collect.len().await, 3);
    }

    #[tokio::test]
    async fn filter_preserves_order() {
        let perms = SubRepoPermissions::builder()
            .deny("acme/api", r"^f[13]\.rs$")
            .build()
            .unwrap();
        let collect = CollectSink::new();
        let filter = FilterSink::new(&collect, &perms);

        filter.send(paths(5)).await;

        let kept: Vec<_> = collect
            .matches()
            .await
            .into_iter()
            .filter_map(|m| m.path)
            .collect();
        assert_eq!(kept, vec!["f0.rs", "f2.rs", "f4.rs"]);
    }

    #[tokio::test]
    async fn filter_skips_empty_batches() {
        let perms = SubRepoPermissions::builder()
            .deny("acme/api", ".*")
            .build()
            .unwrap();
        let collect = CollectSink::new();
        FilterSink::new(&collect, &perms).send(paths(4)).await;
        assert_eq!(collect.batches(), 0);
    }

    #[tokio::test]
    async fn channel_sink_streams_batches() {
        let (sink, mut stream) = ChannelSink::new(4);
        sink.send(paths(2)).await;
        sink.send(SearchEvent::default()).await;
        drop(sink);

        let first = stream.next().await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn channel_sink_tolerates_dropped_consumer() {
        let (sink, stream) = ChannelSink::new(1);
        drop(stream);
        sink.send(paths(1)).await;
        sink.send(paths(1)).await;
        assert!(sink.closed.load(Ordering::Relaxed));
    }
}
