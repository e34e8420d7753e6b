// ── Runtime tunables ──
//
// Plain values the host passes in at construction time. Loading them from
// files and the environment is the job of `proxyhost-config`.

use std::time::Duration;

use proxyhost_feed::replay::{DEFAULT_HISTORY_CAPACITY, DEFAULT_LIVE_CAPACITY};
use proxyhost_feed::{FeedEndpoint, ReconnectConfig};

/// Default coalescing window for batched event delivery.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(100);

/// Event ingestion settings.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub endpoint: FeedEndpoint,
    pub reconnect: ReconnectConfig,
    /// Records retained for late subscribers.
    pub history_capacity: usize,
    /// Per-subscriber live ring size before lagging.
    pub live_capacity: usize,
    pub batch_window: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: FeedEndpoint::default(),
            reconnect: ReconnectConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            live_capacity: DEFAULT_LIVE_CAPACITY,
            batch_window: DEFAULT_BATCH_WINDOW,
        }
    }
}

/// Settings for a [`HostContext`](crate::HostContext).
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub ingest: IngestConfig,
    /// Start the engine as soon as the context is built.
    pub autostart: bool,
    /// Feed port to follow while the engine runs, for engines that do not
    /// report one themselves.
    pub feed_port: Option<u16>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            autostart: true,
            feed_port: None,
        }
    }
}
