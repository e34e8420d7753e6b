//! WebSocket event feed with auto-reconnect.
//!
//! Connects to a running engine's event endpoint and pushes decoded
//! [`EventRecord`]s into a shared [`FeedSink`]. Reconnects with capped
//! exponential backoff until cancelled. The default configuration is a
//! fixed one-second delay.
//!
//! # Example
//!
//! ```rust,ignore
//! use proxyhost_feed::{FeedEndpoint, FeedHandle, FeedSink, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let sink = FeedSink::default();
//! let url = FeedEndpoint::default().url_for(3010)?;
//! let handle = FeedHandle::connect(url, ReconnectConfig::default(), sink.clone(), CancellationToken::new())?;
//!
//! let mut events = sink.subscribe();
//! while let Some(event) = events.recv().await {
//!     println!("{} via {}", event.host(), event.outbound());
//! }
//!
//! handle.shutdown().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::event::{self, EventRecord};
use crate::replay::{ReplayChannel, ReplaySubscription};

// ── FeedState ────────────────────────────────────────────────────────

/// Observable state of the ingestion state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// No endpoint to connect to.
    Idle,
    /// Handshake in flight.
    Connecting,
    /// Handshake done, frames flowing.
    Streaming,
    /// Waiting before the next connection attempt.
    BackingOff { attempt: u32 },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Backoff configuration for feed reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 1s (fixed delay).
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectConfig {
    /// Constant delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
        }
    }
}

// ── FeedSink ─────────────────────────────────────────────────────────

/// Where a feed loop delivers its output: decoded events and state.
///
/// Shared across successive [`FeedHandle`]s so consumers keep one
/// subscription while the endpoint changes underneath.
#[derive(Clone)]
pub struct FeedSink {
    events: ReplayChannel<EventRecord>,
    state: Arc<watch::Sender<FeedState>>,
}

impl FeedSink {
    pub fn new(events: ReplayChannel<EventRecord>) -> Self {
        let (state, _) = watch::channel(FeedState::Idle);
        Self {
            events,
            state: Arc::new(state),
        }
    }

    pub fn events(&self) -> &ReplayChannel<EventRecord> {
        &self.events
    }

    /// Attach to the event sequence (replayed history, then live).
    pub fn subscribe(&self) -> ReplaySubscription<EventRecord> {
        self.events.subscribe()
    }

    /// Subscribe to state machine transitions.
    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> FeedState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, next: FeedState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                tracing::debug!(from = ?*current, to = ?next, "feed state transition");
                *current = next;
                true
            }
        });
    }

    /// Mark the sink idle. Used by owners once no endpoint is active.
    pub fn mark_idle(&self) {
        self.set_state(FeedState::Idle);
    }
}

impl Default for FeedSink {
    fn default() -> Self {
        Self::new(ReplayChannel::default())
    }
}

// ── FeedHandle ───────────────────────────────────────────────────────

/// Handle to one running feed loop bound to a single URL.
///
/// The loop is owned by the handle: [`shutdown`](Self::shutdown) cancels it
/// and waits for the task to finish.
pub struct FeedHandle {
    url: Url,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Spawn the reconnection loop for `url`.
    ///
    /// Returns immediately once the background task is spawned; the first
    /// connection attempt happens asynchronously. Must be called from
    /// within a Tokio runtime.
    pub fn connect(
        url: Url,
        reconnect: ReconnectConfig,
        sink: FeedSink,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::InvalidEndpoint {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let task_cancel = cancel.clone();
        let task_url = url.clone();
        let task = tokio::spawn(async move {
            feed_loop(task_url, sink, reconnect, task_cancel).await;
        });

        Ok(Self { url, cancel, task })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "feed task ended abnormally");
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single connection ended after its handshake succeeded.
enum SessionEnd {
    Cancelled,
    /// The peer or the transport ended the session (`WebSocketClosed`).
    Ended(Error),
}

/// Close code used when the peer closed without sending a status.
const CLOSE_NO_STATUS: u16 = 1005;

/// Close code used when the connection dropped without a close frame.
const CLOSE_ABNORMAL: u16 = 1006;

/// Main loop: connect → read → backoff → reconnect.
///
/// Only cancellation ends the loop; failures back off and try again.
async fn feed_loop(
    url: Url,
    sink: FeedSink,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        sink.set_state(FeedState::Connecting);

        match connect_and_read(&url, &sink, &cancel).await {
            Ok(SessionEnd::Cancelled) => break,
            Ok(SessionEnd::Ended(e)) => {
                if is_normal_close(&e) {
                    tracing::info!(url = %url, "feed disconnected cleanly");
                } else {
                    tracing::warn!(url = %url, error = %e, "feed connection dropped");
                }
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, attempt, "feed connection failed");
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        let delay = calculate_backoff(attempt, &reconnect);
        sink.set_state(FeedState::BackingOff { attempt });
        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    sink.mark_idle();
    tracing::debug!(url = %url, "feed loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection and read frames until it ends.
///
/// `Err` means the handshake never completed.
async fn connect_and_read(
    url: &Url,
    sink: &FeedSink,
    cancel: &CancellationToken,
) -> Result<SessionEnd, Error> {
    tracing::debug!(url = %url, "connecting to event feed");

    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };
    let (ws_stream, _response) = connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!(url = %url, "event feed connected");
    sink.set_state(FeedState::Streaming);

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        decode_and_publish(text.as_str(), sink);
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return Ok(SessionEnd::Ended(close_error(frame)));
                    }
                    Some(Err(e)) => {
                        return Ok(SessionEnd::Ended(Error::WebSocketClosed {
                            code: CLOSE_ABNORMAL,
                            reason: e.to_string(),
                        }));
                    }
                    None => {
                        return Ok(SessionEnd::Ended(Error::WebSocketClosed {
                            code: CLOSE_ABNORMAL,
                            reason: "stream ended without a close frame".into(),
                        }));
                    }
                    Some(Ok(_)) => {
                        // Binary, Ping, Pong, Frame: nothing to decode
                    }
                }
            }
        }
    }
}

fn close_error(frame: Option<tungstenite::protocol::CloseFrame>) -> Error {
    match frame {
        Some(cf) => Error::WebSocketClosed {
            code: u16::from(cf.code),
            reason: cf.reason.as_str().to_owned(),
        },
        None => Error::WebSocketClosed {
            code: CLOSE_NO_STATUS,
            reason: "no status".into(),
        },
    }
}

/// Normal closure (1000) or a bare close frame.
fn is_normal_close(error: &Error) -> bool {
    matches!(
        error,
        Error::WebSocketClosed { code: 1000 | CLOSE_NO_STATUS, .. }
    )
}

// ── Frame decoding ───────────────────────────────────────────────────

/// Decode a text frame and publish it. Malformed frames are skipped.
fn decode_and_publish(text: &str, sink: &FeedSink) {
    match event::decode(text) {
        Ok(record) => {
            tracing::trace!(host = record.host(), outbound = record.outbound(), "feed event");
            sink.events.publish(record);
        }
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed feed frame");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// `delay = min(initial * 2^attempt, max)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let factor = 2_u32.saturating_pow(attempt);
    config
        .initial_delay
        .saturating_mul(factor)
        .min(config.max_delay)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config_is_fixed_one_second() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(1));

        for attempt in 0..5 {
            assert_eq!(calculate_backoff(attempt, &config), Duration::from_secs(1));
        }
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(calculate_backoff(0, &config), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, &config), Duration::from_millis(200));
        assert_eq!(calculate_backoff(2, &config), Duration::from_millis(400));
        assert_eq!(calculate_backoff(3, &config), Duration::from_millis(500));
        assert_eq!(calculate_backoff(40, &config), Duration::from_millis(500));
    }

    #[test]
    fn malformed_frame_is_skipped() {
        let sink = FeedSink::default();
        let mut sub = sink.subscribe();

        decode_and_publish("{ not json", &sink);
        decode_and_publish(
            r#"{"type":"Connected","host":"a","port":1,"outbound":"direct","delay_millis":1,"request_time_millis":2}"#,
            &sink,
        );

        let event = sub.try_recv().unwrap();
        assert_eq!(event.host(), "a");
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn close_frames_map_to_websocket_closed() {
        use tungstenite::protocol::{CloseFrame, frame::coding::CloseCode};

        let away = close_error(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".into(),
        }));
        assert!(matches!(
            &away,
            Error::WebSocketClosed { code: 1001, reason } if reason == "restarting"
        ));
        assert!(!is_normal_close(&away));

        let bare = close_error(None);
        assert!(matches!(bare, Error::WebSocketClosed { code: CLOSE_NO_STATUS, .. }));
        assert!(is_normal_close(&bare));

        let normal = close_error(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        assert!(is_normal_close(&normal));
    }

    #[test]
    fn sink_state_transitions_are_deduplicated() {
        let sink = FeedSink::default();
        let mut rx = sink.state();
        rx.borrow_and_update();

        sink.set_state(FeedState::Idle);
        assert!(!rx.has_changed().unwrap());

        sink.set_state(FeedState::Connecting);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), FeedState::Connecting);
    }

    #[tokio::test]
    async fn rejects_non_websocket_scheme() {
        let url = Url::parse("http://127.0.0.1:1/events").unwrap();
        let result = FeedHandle::connect(
            url,
            ReconnectConfig::default(),
            FeedSink::default(),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(Error::InvalidEndpoint { .. })));
    }
}
