//! Event stream ingestion.
//!
//! [`EventIngestion`] follows an endpoint published by some other component
//! (normally the running engine) and keeps exactly one feed connection open
//! to it. When the endpoint changes the old connection is torn down and a new
//! one opened; when it disappears the feed goes idle. Consumers attach to a
//! single [`ReplaySubscription`] that survives all of this.

mod batch;

use std::sync::{Mutex, PoisonError};

use proxyhost_feed::{
    EventRecord, FeedHandle, FeedSink, FeedState, ReplayChannel, ReplaySubscription,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::IngestConfig;

pub use batch::EventBatches;

/// Owns the endpoint-following task and the shared event sink.
pub struct EventIngestion {
    sink: FeedSink,
    config: IngestConfig,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventIngestion {
    /// Follow `source`, connecting to whatever port `endpoint_of` extracts.
    pub fn spawn<S, F>(config: IngestConfig, source: watch::Receiver<S>, endpoint_of: F) -> Self
    where
        S: Send + Sync + 'static,
        F: Fn(&S) -> Option<u16> + Send + 'static,
    {
        let sink = FeedSink::new(ReplayChannel::new(
            config.history_capacity,
            config.live_capacity,
        ));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(follow_endpoint(
            source,
            endpoint_of,
            sink.clone(),
            config.clone(),
            cancel.clone(),
        ));

        Self {
            sink,
            config,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stream from one fixed port until shut down.
    pub fn fixed(config: IngestConfig, port: u16) -> Self {
        let (_, rx) = watch::channel(Some(port));
        Self::spawn(config, rx, |port: &Option<u16>| *port)
    }

    /// Replayed history followed by live records.
    pub fn subscribe(&self) -> ReplaySubscription<EventRecord> {
        self.sink.subscribe()
    }

    /// Like [`subscribe`](Self::subscribe), coalesced per batch window.
    pub fn batches(&self) -> EventBatches<EventRecord> {
        EventBatches::new(self.subscribe(), self.config.batch_window)
    }

    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.sink.state()
    }

    pub fn current_state(&self) -> FeedState {
        self.sink.current_state()
    }

    pub fn events(&self) -> &ReplayChannel<EventRecord> {
        self.sink.events()
    }

    /// Close the connection and stop following the endpoint.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "ingestion task ended abnormally");
            }
        }
        self.sink.mark_idle();
    }
}

async fn follow_endpoint<S, F>(
    mut source: watch::Receiver<S>,
    endpoint_of: F,
    sink: FeedSink,
    config: IngestConfig,
    cancel: CancellationToken,
) where
    S: Send + Sync + 'static,
    F: Fn(&S) -> Option<u16> + Send + 'static,
{
    let mut current: Option<FeedHandle> = None;
    let mut source_open = true;

    loop {
        let port = endpoint_of(&source.borrow_and_update());
        let wanted = port.and_then(|port| match config.endpoint.url_for(port) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(port, error = %e, "ignoring unusable feed endpoint");
                None
            }
        });

        if current.as_ref().map(FeedHandle::url) != wanted.as_ref() {
            if let Some(old) = current.take() {
                tracing::info!(url = %old.url(), "closing event feed");
                old.shutdown().await;
            }
            current = wanted.and_then(|url| open(url, &sink, &config, &cancel));
            if current.is_none() {
                sink.mark_idle();
            }
        }

        if !source_open {
            cancel.cancelled().await;
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = source.changed() => {
                // A closed source keeps its last value; hold the connection.
                source_open = changed.is_ok();
            }
        }
    }

    if let Some(handle) = current {
        handle.shutdown().await;
    }
    sink.mark_idle();
}

fn open(
    url: Url,
    sink: &FeedSink,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> Option<FeedHandle> {
    tracing::info!(url = %url, "opening event feed");
    match FeedHandle::connect(
        url,
        config.reconnect.clone(),
        sink.clone(),
        cancel.child_token(),
    ) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "cannot open event feed");
            None
        }
    }
}
