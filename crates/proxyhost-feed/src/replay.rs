//! Broadcast fan-out with a bounded replay window.
//!
//! [`ReplayChannel`] keeps the most recent `history_capacity` items and
//! forwards every new item to live subscribers through a
//! [`tokio::sync::broadcast`] channel. A subscriber attaching late first
//! drains the retained history, then continues with live items. History
//! snapshot and live registration happen under the same lock as
//! [`publish`](ReplayChannel::publish), so nothing is duplicated or lost at
//! the seam.
//!
//! Slow subscribers lag independently: the broadcast ring drops their oldest
//! unread items and they skip ahead. Publishing never waits on a consumer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_core::Stream;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Default number of items retained for late subscribers.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default live broadcast ring size per subscriber.
pub const DEFAULT_LIVE_CAPACITY: usize = 1024;

/// Cloneable handle to a shared replay buffer.
pub struct ReplayChannel<T> {
    inner: Arc<ReplayInner<T>>,
}

struct ReplayInner<T> {
    history: Mutex<VecDeque<Arc<T>>>,
    history_capacity: usize,
    live: broadcast::Sender<Arc<T>>,
}

impl<T> Clone for ReplayChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> ReplayChannel<T> {
    /// `live_capacity` is clamped to at least 1 (broadcast requires it).
    pub fn new(history_capacity: usize, live_capacity: usize) -> Self {
        let (live, _) = broadcast::channel(live_capacity.max(1));
        Self {
            inner: Arc::new(ReplayInner {
                history: Mutex::new(VecDeque::with_capacity(history_capacity)),
                history_capacity,
                live,
            }),
        }
    }

    /// Append an item to the history and fan it out to live subscribers.
    pub fn publish(&self, item: T) -> Arc<T> {
        let item = Arc::new(item);
        let mut history = self.lock_history();

        if self.inner.history_capacity > 0 {
            if history.len() == self.inner.history_capacity {
                history.pop_front();
            }
            history.push_back(Arc::clone(&item));
        }

        // No receivers is not an error: history still holds the item.
        let _ = self.inner.live.send(Arc::clone(&item));
        item
    }

    /// Attach a new consumer: retained history first, then live items.
    pub fn subscribe(&self) -> ReplaySubscription<T> {
        let history = self.lock_history();
        let live = self.inner.live.subscribe();
        ReplaySubscription {
            backlog: history.iter().cloned().collect(),
            live,
        }
    }

    /// Copy of the retained history, oldest first.
    pub fn history(&self) -> Vec<Arc<T>> {
        self.lock_history().iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.lock_history().len()
    }

    pub fn history_capacity(&self) -> usize {
        self.inner.history_capacity
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.live.receiver_count()
    }

    fn lock_history(&self) -> MutexGuard<'_, VecDeque<Arc<T>>> {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync + 'static> Default for ReplayChannel<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, DEFAULT_LIVE_CAPACITY)
    }
}

/// A consumer's view of a [`ReplayChannel`].
pub struct ReplaySubscription<T> {
    backlog: VecDeque<Arc<T>>,
    live: broadcast::Receiver<Arc<T>>,
}

impl<T: Send + Sync + 'static> ReplaySubscription<T> {
    /// Next item, waiting for a live one once the backlog is drained.
    ///
    /// Returns `None` once every [`ReplayChannel`] handle has been dropped.
    /// Cancel-safe: a dropped call never consumes an item.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        if let Some(item) = self.backlog.pop_front() {
            return Some(item);
        }

        loop {
            match self.live.recv().await {
                Ok(item) => return Some(item),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "replay subscriber lagged, dropping oldest items");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Arc<T>> {
        if let Some(item) = self.backlog.pop_front() {
            return Some(item);
        }

        loop {
            match self.live.try_recv() {
                Ok(item) => return Some(item),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "replay subscriber lagged, dropping oldest items");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(mut self) -> impl Stream<Item = Arc<T>> + Send {
        async_stream::stream! {
            while let Some(item) = self.recv().await {
                yield item;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(sub: &mut ReplaySubscription<u32>) -> Vec<u32> {
        std::iter::from_fn(|| sub.try_recv()).map(|v| *v).collect()
    }

    #[test]
    fn late_subscriber_sees_only_most_recent_window() {
        let channel = ReplayChannel::new(100, 1024);
        for i in 0..150 {
            channel.publish(i);
        }

        let mut sub = channel.subscribe();
        let seen = drain(&mut sub);

        assert_eq!(seen.len(), 100);
        assert_eq!(seen, (50..150).collect::<Vec<_>>());
    }

    #[test]
    fn history_then_live_without_gap_or_duplicate() {
        let channel = ReplayChannel::new(4, 16);
        channel.publish(1);
        channel.publish(2);

        let mut sub = channel.subscribe();
        channel.publish(3);

        assert_eq!(drain(&mut sub), vec![1, 2, 3]);
    }

    #[test]
    fn independent_subscribers() {
        let channel = ReplayChannel::new(10, 16);
        let mut a = channel.subscribe();
        channel.publish(7);
        let mut b = channel.subscribe();
        channel.publish(8);

        assert_eq!(drain(&mut a), vec![7, 8]);
        assert_eq!(drain(&mut b), vec![7, 8]);
        assert_eq!(channel.subscriber_count(), 2);
    }

    #[test]
    fn slow_subscriber_skips_ahead_without_blocking_publisher() {
        let channel = ReplayChannel::new(0, 2);
        let mut slow = channel.subscribe();
        for i in 0..10 {
            channel.publish(i);
        }

        let seen = drain(&mut slow);
        assert_eq!(seen, vec![8, 9]);
    }

    #[test]
    fn zero_history_retains_nothing() {
        let channel = ReplayChannel::new(0, 4);
        channel.publish(1);
        assert_eq!(channel.history_len(), 0);
        assert!(channel.subscribe().try_recv().is_none());
    }

    #[test]
    fn recv_wakes_on_publish() {
        let channel = ReplayChannel::new(4, 4);
        let mut sub = channel.subscribe();
        let mut recv = tokio_test::task::spawn(sub.recv());

        tokio_test::assert_pending!(recv.poll());
        channel.publish(9_u32);
        assert!(recv.is_woken());
        let got = tokio_test::assert_ready!(recv.poll());
        assert_eq!(got.map(|v| *v), Some(9));
    }

    #[tokio::test]
    async fn recv_ends_when_channel_dropped() {
        let channel = ReplayChannel::new(2, 4);
        channel.publish(5);
        let mut sub = channel.subscribe();
        drop(channel);

        assert_eq!(sub.recv().await.map(|v| *v), Some(5));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn into_stream_yields_in_order() {
        use futures_util::StreamExt;

        let channel = ReplayChannel::new(8, 8);
        for i in 0..3 {
            channel.publish(i);
        }
        let sub = channel.subscribe();
        drop(channel);

        let items: Vec<u32> = sub.into_stream().map(|v| *v).collect().await;
        assert_eq!(items, vec![0, 1, 2]);
    }
}
