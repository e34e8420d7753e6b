#![allow(clippy::unwrap_used)]
// Integration tests for `FeedHandle` against a real local WebSocket server.

use std::time::{Duration, Instant};

use futures_util::SinkExt;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use proxyhost_feed::{
    EventRecord, FeedEndpoint, FeedHandle, FeedSink, FeedState, ReconnectConfig,
    ReplaySubscription,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn connected(host: &str) -> String {
    serde_json::json!({
        "type": "Connected",
        "host": host,
        "port": 443,
        "outbound": "direct",
        "delay_millis": 5,
        "request_time_millis": 1_700_000_000_000_u64,
    })
    .to_string()
}

struct Epochs {
    port: u16,
    /// (first connection closed, second connection accepted)
    timing: oneshot::Receiver<(Instant, Instant)>,
    stop: oneshot::Sender<()>,
}

/// Serve two epochs: the first sends `first` then closes, the second sends
/// `second` and stays open until `stop` fires.
async fn serve_two_epochs(first: Vec<String>, second: Vec<String>) -> Epochs {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (timing_tx, timing) = oneshot::channel();
    let (stop, stop_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for frame in first {
            ws.send(Message::text(frame)).await.unwrap();
        }
        ws.close(None).await.unwrap();
        drop(ws);
        let closed_at = Instant::now();

        let (stream, _) = listener.accept().await.unwrap();
        let accepted_at = Instant::now();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = timing_tx.send((closed_at, accepted_at));
        for frame in second {
            ws.send(Message::text(frame)).await.unwrap();
        }
        let _ = stop_rx.await;
    });

    Epochs { port, timing, stop }
}

async fn next_host(sub: &mut ReplaySubscription<EventRecord>) -> String {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("timed out waiting for event")
        .expect("feed closed")
        .host()
        .to_owned()
}

// ── Reconnect tests ─────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_survives_drop_without_duplicates() {
    let backoff = Duration::from_millis(100);
    let epochs = serve_two_epochs(
        vec![connected("a"), "garbage frame".into(), connected("b"), connected("c")],
        vec![connected("d"), connected("e")],
    )
    .await;

    let sink = FeedSink::default();
    let mut sub = sink.subscribe();
    let url = FeedEndpoint::default().url_for(epochs.port).unwrap();
    let handle = FeedHandle::connect(
        url,
        ReconnectConfig::fixed(backoff),
        sink.clone(),
        CancellationToken::new(),
    )
    .unwrap();

    let mut hosts = Vec::new();
    for _ in 0..5 {
        hosts.push(next_host(&mut sub).await);
    }
    assert_eq!(hosts, vec!["a", "b", "c", "d", "e"]);

    let (closed_at, accepted_at) = epochs.timing.await.unwrap();
    let gap = accepted_at.duration_since(closed_at);
    assert!(
        gap < backoff + Duration::from_millis(900),
        "reconnect took {gap:?}, expected about one backoff interval"
    );

    assert_eq!(sink.current_state(), FeedState::Streaming);

    handle.shutdown().await;
    let _ = epochs.stop.send(());
    assert_eq!(sink.current_state(), FeedState::Idle);
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn test_backs_off_while_endpoint_unreachable() {
    // Bind then drop to get a port with nothing listening.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let sink = FeedSink::default();
    let mut state = sink.state();
    let url = FeedEndpoint::default().url_for(port).unwrap();
    let handle = FeedHandle::connect(
        url,
        ReconnectConfig::fixed(Duration::from_secs(30)),
        sink.clone(),
        CancellationToken::new(),
    )
    .unwrap();

    // Evaluate to a bool right away so the watch read guard is released.
    let backing_off = tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| matches!(s, FeedState::BackingOff { .. })),
    )
    .await
    .is_ok_and(|r| r.is_ok());
    assert!(backing_off, "never entered BackingOff");

    handle.shutdown().await;
    assert_eq!(sink.current_state(), FeedState::Idle);
}

#[tokio::test]
async fn test_retries_forever_while_endpoint_stays_down() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let sink = FeedSink::default();
    let mut state = sink.state();
    let url = FeedEndpoint::default().url_for(port).unwrap();
    let handle = FeedHandle::connect(
        url,
        ReconnectConfig::fixed(Duration::from_millis(10)),
        sink.clone(),
        CancellationToken::new(),
    )
    .unwrap();

    let mut started = false;
    let mut idle_after_start = false;
    let reached = tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| {
            if *s == FeedState::Idle {
                idle_after_start |= started;
            } else {
                started = true;
            }
            matches!(s, FeedState::BackingOff { attempt } if *attempt >= 8)
        }),
    )
    .await
    .is_ok_and(|r| r.is_ok());

    assert!(reached, "feed stopped retrying");
    assert!(!idle_after_start, "feed went idle while its endpoint was still set");

    handle.shutdown().await;
    assert_eq!(sink.current_state(), FeedState::Idle);
}

#[tokio::test]
async fn test_late_subscriber_replays_history() {
    let frames: Vec<String> = (0..150).map(|i| connected(&format!("h{i}"))).collect();
    let epochs = serve_two_epochs(frames, Vec::new()).await;

    let sink = FeedSink::default();
    let mut early = sink.subscribe();
    let url = FeedEndpoint::default().url_for(epochs.port).unwrap();
    let handle = FeedHandle::connect(
        url,
        ReconnectConfig::fixed(Duration::from_millis(50)),
        sink.clone(),
        CancellationToken::new(),
    )
    .unwrap();

    for i in 0..150 {
        assert_eq!(next_host(&mut early).await, format!("h{i}"));
    }

    let mut late = sink.subscribe();
    let mut replayed = Vec::new();
    while let Some(event) = late.try_recv() {
        replayed.push(event.host().to_owned());
    }
    let expected: Vec<String> = (50..150).map(|i| format!("h{i}")).collect();
    assert_eq!(replayed, expected);

    handle.shutdown().await;
    let _ = epochs.stop.send(());
}
