// ── Consumer-side batching ──
//
// Coalesces records arriving within one window into a single Vec so a UI
// redraws once per window instead of once per record. Order is preserved
// and nothing is dropped here; lag is handled by the replay subscription.

use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use proxyhost_feed::ReplaySubscription;
use tokio::time::Instant;

/// Batches items from a [`ReplaySubscription`].
///
/// The open window lives on the struct, not in the `next_batch` future, so
/// items already pulled from the subscription survive a dropped call.
pub struct EventBatches<T> {
    source: ReplaySubscription<T>,
    window: Duration,
    pending: Vec<Arc<T>>,
    deadline: Option<Instant>,
    closed: bool,
}

impl<T: Send + Sync + 'static> EventBatches<T> {
    pub fn new(source: ReplaySubscription<T>, window: Duration) -> Self {
        Self {
            source,
            window,
            pending: Vec::new(),
            deadline: None,
            closed: false,
        }
    }

    /// Wait for the next non-empty batch.
    ///
    /// The window opens when the first item arrives. Returns `None` once the
    /// source has closed and everything has been delivered.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel-safe. If the future is dropped mid-window, the
    /// items gathered so far stay pending and the next call continues the
    /// same window with its original deadline.
    pub async fn next_batch(&mut self) -> Option<Vec<Arc<T>>> {
        loop {
            if self.closed {
                self.deadline = None;
                return (!self.pending.is_empty()).then(|| std::mem::take(&mut self.pending));
            }

            let next = match self.deadline {
                None => self.source.recv().await,
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.source.recv()).await {
                        Ok(next) => next,
                        Err(_elapsed) => {
                            self.deadline = None;
                            return Some(std::mem::take(&mut self.pending));
                        }
                    }
                }
            };

            match next {
                Some(item) => {
                    if self.pending.is_empty() {
                        self.deadline = Some(Instant::now() + self.window);
                    }
                    self.pending.push(item);
                }
                None => self.closed = true,
            }
        }
    }

    /// Items gathered for the window that is currently open.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Convert into a `Stream` of batches.
    pub fn into_stream(mut self) -> impl Stream<Item = Vec<Arc<T>>> + Send {
        async_stream::stream! {
            while let Some(batch) = self.next_batch().await {
                yield batch;
            }
        }
    }
}
