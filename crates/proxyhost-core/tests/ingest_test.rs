#![allow(clippy::unwrap_used)]
// End-to-end: profile engine advertises an endpoint, ingestion follows it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::SinkExt;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio_tungstenite::tungstenite::Message;

use proxyhost_core::{
    EventIngestion, EventRecord, FactoryError, FeedState, HostConfig, HostContext, IngestConfig,
    LoggingHooks, Profile, ProfileEngine, ProfileParams, ProfileSet, ProfileStore,
    ReconnectConfig, ReplaySubscription, ResourceFactory,
};

fn frame(host: &str) -> String {
    serde_json::json!({
        "type": "Connected",
        "host": host,
        "outbound": "direct",
        "delay_mills": 3,
        "request_time_mills": 1_700_000_000_000_u64,
    })
    .to_string()
}

/// Accept one connection, send `frames`, then hold it open until `stop`.
async fn serve(frames: Vec<String>) -> (u16, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (stop, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for f in frames {
            ws.send(Message::text(f)).await.unwrap();
        }
        let _ = stop_rx.await;
    });
    (port, stop)
}

async fn next_host(sub: &mut ReplaySubscription<EventRecord>) -> String {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("timed out waiting for event")
        .expect("feed closed")
        .host()
        .to_owned()
}

async fn wait_for_state(rx: &mut watch::Receiver<FeedState>, want: FeedState) {
    let reached = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
        .await
        .is_ok_and(|r| r.is_ok());
    assert!(reached, "feed never reached {want:?}");
}

fn fast_ingest() -> IngestConfig {
    IngestConfig {
        reconnect: ReconnectConfig::fixed(Duration::from_millis(50)),
        ..IngestConfig::default()
    }
}

#[derive(Clone, Default)]
struct Counting(Arc<AtomicUsize>);

impl ResourceFactory<ProfileParams> for Counting {
    type Handle = ();

    fn create(&self, _params: &ProfileParams) -> Result<(), FactoryError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&self, (): ()) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_follows_engine_endpoint_and_goes_idle_without_selection() {
    let (port, stop) = serve(vec![frame("a.example"), frame("b.example")]).await;

    let mut profile = Profile::new("home", "https://home.example.com");
    profile.id = "home".into();
    let set = ProfileSet {
        enabled_profile_id: Some(profile.id.clone()),
        profiles: vec![profile],
        api_server_port: port,
        http_proxy_port: 18080,
        socks5_proxy_port: 11080,
    };

    let factory = Counting::default();
    let live = Arc::clone(&factory.0);
    let config = HostConfig {
        ingest: fast_ingest(),
        ..HostConfig::default()
    };
    let context = HostContext::start(
        &config,
        ProfileStore::with_set(set).unwrap(),
        ProfileEngine::new(factory),
        LoggingHooks,
    )
    .unwrap();

    let mut events = context.ingestion().subscribe();
    assert_eq!(next_host(&mut events).await, "a.example");
    assert_eq!(next_host(&mut events).await, "b.example");
    assert_eq!(live.load(Ordering::SeqCst), 1);

    let mut state = context.ingestion().state();
    wait_for_state(&mut state, FeedState::Streaming).await;

    context.store().select(None).unwrap();
    wait_for_state(&mut state, FeedState::Idle).await;

    context.shutdown().await;
    let _ = stop.send(());
    assert_eq!(live.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_switches_to_new_endpoint() {
    let (first_port, first_stop) = serve(vec![frame("first")]).await;
    let (second_port, second_stop) = serve(vec![frame("second")]).await;

    let (tx, rx) = watch::channel(Some(first_port));
    let ingestion = EventIngestion::spawn(fast_ingest(), rx, |port: &Option<u16>| *port);
    let mut events = ingestion.subscribe();
    assert_eq!(next_host(&mut events).await, "first");

    tx.send_replace(Some(second_port));
    assert_eq!(next_host(&mut events).await, "second");

    ingestion.shutdown().await;
    assert_eq!(ingestion.current_state(), FeedState::Idle);
    let _ = first_stop.send(());
    let _ = second_stop.send(());
}

#[tokio::test]
async fn test_batches_arrive_in_feed_order() {
    let frames: Vec<String> = (0..20).map(|i| frame(&format!("h{i}"))).collect();
    let (port, stop) = serve(frames).await;

    let ingestion = EventIngestion::fixed(fast_ingest(), port);
    let mut batches = ingestion.batches();

    let mut hosts = Vec::new();
    while hosts.len() < 20 {
        let batch = tokio::time::timeout(Duration::from_secs(5), batches.next_batch())
            .await
            .unwrap()
            .unwrap();
        hosts.extend(batch.iter().map(|e| e.host().to_owned()));
    }
    let expected: Vec<String> = (0..20).map(|i| format!("h{i}")).collect();
    assert_eq!(hosts, expected);

    ingestion.shutdown().await;
    let _ = stop.send(());
}
