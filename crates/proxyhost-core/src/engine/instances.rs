//! Multi-instance reconciliation driver.
//!
//! [`InstanceEngine`] applies [`plan`](super::plan::plan) to the handles it
//! owns: retire first, then create, then publish a fresh
//! [`ReconciledState`]. Factory calls happen only here, one pass at a time,
//! so create and destroy for the same identity never overlap.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::watch;

use super::plan::plan;
use super::task::{Lifecycle, Reconcile};
use crate::error::{CoreError, FactoryError};
use crate::factory::ResourceFactory;
use crate::model::{
    ConnectionParams, InstanceConfig, InstanceId, InstanceStatus, Outcome, ReconciledState,
};

/// What the engine holds for one identity.
struct InstanceState<H> {
    resource: Result<H, FactoryError>,
    /// The parameters `resource` was built from.
    fingerprint: ConnectionParams,
}

impl<H> InstanceState<H> {
    fn status(&self) -> InstanceStatus {
        InstanceStatus {
            fingerprint: self.fingerprint.clone(),
            outcome: match &self.resource {
                Ok(_) => Outcome::Running,
                Err(e) => Outcome::Failed(e.message().to_owned()),
            },
        }
    }
}

struct Held<H> {
    instances: BTreeMap<InstanceId, InstanceState<H>>,
    generation: u64,
}

/// Keeps one handle per enabled instance configuration.
pub struct InstanceEngine<F: ResourceFactory<ConnectionParams>> {
    factory: F,
    held: Mutex<Held<F::Handle>>,
    state: watch::Sender<Arc<ReconciledState>>,
    lifecycle: Lifecycle,
}

impl<F: ResourceFactory<ConnectionParams>> InstanceEngine<F> {
    pub fn new(factory: F) -> Self {
        let (state, _) = watch::channel(Arc::new(ReconciledState::default()));
        Self {
            factory,
            held: Mutex::new(Held {
                instances: BTreeMap::new(),
                generation: 0,
            }),
            state,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    // ── Started flag ─────────────────────────────────────────────────

    /// Allow handles to exist. Idempotent.
    pub fn start(&self) {
        if self.lifecycle.set_started(true) {
            tracing::info!("instance engine started");
        }
    }

    /// Retire every handle on the next pass. Idempotent.
    pub fn stop(&self) {
        if self.lifecycle.set_started(false) {
            tracing::info!("instance engine stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    // ── Published view ───────────────────────────────────────────────

    pub fn subscribe(&self) -> watch::Receiver<Arc<ReconciledState>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Arc<ReconciledState> {
        Arc::clone(&self.state.borrow())
    }

    /// At least one instance is live.
    pub fn is_running(&self) -> bool {
        self.state.borrow().is_running()
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Run one full pass against `snapshot` and publish the result.
    ///
    /// While stopped the snapshot is treated as empty.
    pub fn reconcile_now(&self, snapshot: &[InstanceConfig]) -> Arc<ReconciledState> {
        if self.lifecycle.is_started() {
            self.apply(snapshot)
        } else {
            self.apply(&[])
        }
    }

    fn apply(&self, desired: &[InstanceConfig]) -> Arc<ReconciledState> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        let previous: BTreeMap<InstanceId, ConnectionParams> = held
            .instances
            .iter()
            .map(|(id, s)| (id.clone(), s.fingerprint.clone()))
            .collect();
        let pass = plan(&previous, desired);
        let created = pass.create.len();

        for id in &pass.retire {
            let Some(retired) = held.instances.remove(id) else {
                continue;
            };
            match retired.resource {
                Ok(handle) => {
                    self.factory.destroy(handle);
                    tracing::info!(instance = %id, "instance released");
                }
                Err(_) => tracing::debug!(instance = %id, "dropping failed attempt"),
            }
        }

        for config in pass.create {
            let resource = self.factory.create(&config.params);
            match &resource {
                Ok(_) => tracing::info!(
                    instance = %config.id,
                    name = %config.name,
                    server = %config.params.server_host,
                    bind = %config.params.bind_address,
                    "instance created"
                ),
                Err(e) => tracing::warn!(
                    instance = %config.id,
                    name = %config.name,
                    error = %e,
                    "instance creation failed"
                ),
            }
            held.instances.insert(
                config.id,
                InstanceState {
                    resource,
                    fingerprint: config.params,
                },
            );
        }

        held.generation += 1;
        let view = Arc::new(ReconciledState {
            generation: held.generation,
            updated_at: Some(Utc::now()),
            instances: held
                .instances
                .iter()
                .map(|(id, s)| (id.clone(), s.status()))
                .collect(),
        });
        tracing::debug!(
            generation = view.generation,
            retired = pass.retire.len(),
            created,
            kept = pass.keep.len(),
            running = view.running_count(),
            failed = view.failed_count(),
            "reconciliation pass"
        );

        // Publish while still holding the lock so views stay ordered.
        self.state.send_replace(Arc::clone(&view));
        view
    }

    // ── Background task ──────────────────────────────────────────────

    /// Reconcile in the background on every snapshot or started-flag change.
    pub fn spawn(
        self: &Arc<Self>,
        snapshots: watch::Receiver<Arc<Vec<InstanceConfig>>>,
    ) -> Result<(), CoreError> {
        self.lifecycle.spawn(Arc::clone(self), snapshots)
    }

    /// Stop the background task, then release every handle.
    ///
    /// All handles are destroyed before this returns.
    pub async fn shutdown(&self) {
        self.lifecycle.join().await;
        self.lifecycle.set_started(false);
        self.apply(&[]);
        tracing::info!("instance engine shut down");
    }
}

impl<F: ResourceFactory<ConnectionParams>> Reconcile for InstanceEngine<F> {
    type Snapshot = Vec<InstanceConfig>;

    fn run_pass(&self, snapshot: &Self::Snapshot) {
        self.reconcile_now(snapshot);
    }
}
