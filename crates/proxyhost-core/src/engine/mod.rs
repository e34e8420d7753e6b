// ── Reconciliation engines ──
//
// `InstanceEngine` diffs by fingerprint and touches only what changed.
// `ProfileEngine` rebuilds its single handle on every change. Both are
// driven the same way, which `Engine` captures for the host.

mod instances;
pub mod plan;
mod profile;
mod task;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::CoreError;
use crate::factory::ResourceFactory;
use crate::model::{
    ConnectionParams, EngineStatus, InstanceConfig, ProfileParams, ProfileSet, ProfileState,
    ReconciledState,
};
use crate::stream::StateStream;

pub use instances::InstanceEngine;
pub use plan::{ReconcilePlan, plan};
pub use profile::ProfileEngine;

/// Common surface of both engine variants.
pub trait Engine: Send + Sync + 'static {
    type Snapshot: Send + Sync + 'static;
    type State: EngineStatus;

    fn start(&self);
    fn stop(&self);
    fn subscribe(&self) -> watch::Receiver<Arc<Self::State>>;
    fn spawn(
        self: &Arc<Self>,
        snapshots: watch::Receiver<Arc<Self::Snapshot>>,
    ) -> Result<(), CoreError>;
    fn shutdown(&self) -> impl Future<Output = ()> + Send;

    fn stream(&self) -> StateStream<Self::State> {
        StateStream::new(self.subscribe())
    }
}

impl<F: ResourceFactory<ConnectionParams>> Engine for InstanceEngine<F> {
    type Snapshot = Vec<InstanceConfig>;
    type State = ReconciledState;

    fn start(&self) {
        Self::start(self);
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn subscribe(&self) -> watch::Receiver<Arc<ReconciledState>> {
        Self::subscribe(self)
    }

    fn spawn(
        self: &Arc<Self>,
        snapshots: watch::Receiver<Arc<Vec<InstanceConfig>>>,
    ) -> Result<(), CoreError> {
        Self::spawn(self, snapshots)
    }

    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        Self::shutdown(self)
    }
}

impl<F: ResourceFactory<ProfileParams>> Engine for ProfileEngine<F> {
    type Snapshot = ProfileSet;
    type State = ProfileState;

    fn start(&self) {
        Self::start(self);
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn subscribe(&self) -> watch::Receiver<Arc<ProfileState>> {
        Self::subscribe(self)
    }

    fn spawn(
        self: &Arc<Self>,
        snapshots: watch::Receiver<Arc<ProfileSet>>,
    ) -> Result<(), CoreError> {
        Self::spawn(self, snapshots)
    }

    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        Self::shutdown(self)
    }
}
