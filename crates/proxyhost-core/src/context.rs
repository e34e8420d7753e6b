// ── Application context ──
//
// Everything a running host needs, built once and passed explicitly. The
// context owns the store, the engine and the two observers wired to it,
// and tears them down in dependency order.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::HostConfig;
use crate::coordinator::{ServiceCoordinator, ServiceHooks};
use crate::engine::Engine;
use crate::error::CoreError;
use crate::ingest::EventIngestion;
use crate::model::{EngineStatus, InstanceConfig, ProfileSet};
use crate::store::{InstanceStore, ProfileStore};

/// A store an engine can follow.
pub trait SnapshotSource: Send + Sync + 'static {
    type Snapshot: Send + Sync + 'static;

    fn subscribe(&self) -> watch::Receiver<Arc<Self::Snapshot>>;
}

impl SnapshotSource for InstanceStore {
    type Snapshot = Vec<InstanceConfig>;

    fn subscribe(&self) -> watch::Receiver<Arc<Vec<InstanceConfig>>> {
        Self::subscribe(self)
    }
}

impl SnapshotSource for ProfileStore {
    type Snapshot = ProfileSet;

    fn subscribe(&self) -> watch::Receiver<Arc<ProfileSet>> {
        Self::subscribe(self)
    }
}

/// A wired store → engine → observers pipeline.
pub struct HostContext<S, E>
where
    S: SnapshotSource,
    E: Engine<Snapshot = S::Snapshot>,
{
    store: Arc<S>,
    engine: Arc<E>,
    ingestion: EventIngestion,
    coordinator: ServiceCoordinator,
}

impl<S, E> HostContext<S, E>
where
    S: SnapshotSource,
    E: Engine<Snapshot = S::Snapshot>,
{
    /// Wire everything together and spawn the background tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &HostConfig,
        store: S,
        engine: E,
        hooks: impl ServiceHooks,
    ) -> Result<Self, CoreError> {
        let store = Arc::new(store);
        let engine = Arc::new(engine);
        engine.spawn(store.subscribe())?;

        let fallback = config.feed_port;
        let ingestion = EventIngestion::spawn(
            config.ingest.clone(),
            engine.subscribe(),
            move |state: &Arc<E::State>| {
                state
                    .is_running()
                    .then(|| state.active_endpoint().or(fallback))
                    .flatten()
            },
        );
        let coordinator = ServiceCoordinator::spawn(engine.subscribe(), hooks);

        if config.autostart {
            engine.start();
        }
        tracing::info!(autostart = config.autostart, "host context ready");

        Ok(Self {
            store,
            engine,
            ingestion,
            coordinator,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn ingestion(&self) -> &EventIngestion {
        &self.ingestion
    }

    /// Drain in order: coordinator, ingestion, engine.
    ///
    /// Every handle is released and the feed closed before this returns.
    pub async fn shutdown(self) {
        self.coordinator.shutdown().await;
        self.ingestion.shutdown().await;
        self.engine.shutdown().await;
        tracing::info!("host context shut down");
    }
}
