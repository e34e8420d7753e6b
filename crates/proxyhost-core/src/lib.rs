//! Reconciliation engine and event ingestion for proxy engine instances.
//!
//! The data flow is one-directional:
//!
//! - A store ([`InstanceStore`] or [`ProfileStore`]) publishes validated
//!   configuration snapshots.
//! - An engine ([`InstanceEngine`] or [`ProfileEngine`]) keeps resource
//!   handles from a [`ResourceFactory`] in line with the latest snapshot and
//!   publishes a handle-free view of what it built.
//! - [`EventIngestion`] follows the endpoint that view advertises and fans
//!   decoded feed records out to subscribers, with replay and batching.
//! - [`ServiceCoordinator`] maps the view onto [`ServiceHooks`].
//!
//! [`HostContext`] wires all of it together and shuts it down in order.

pub mod config;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod factory;
pub mod ingest;
pub mod model;
pub mod store;
pub mod stream;

pub use config::{HostConfig, IngestConfig};
pub use context::{HostContext, SnapshotSource};
pub use coordinator::{LoggingHooks, ServiceCoordinator, ServiceHooks};
pub use engine::{Engine, InstanceEngine, ProfileEngine, ReconcilePlan};
pub use error::{CoreError, FactoryError};
pub use factory::ResourceFactory;
pub use ingest::{EventBatches, EventIngestion};
pub use model::{
    ConnectionParams, EngineStatus, InstanceConfig, InstanceId, InstanceStatus, Outcome, Profile,
    ProfileId, ProfileParams, ProfileSet, ProfileState, ReconciledState,
};
pub use store::{InstanceStore, ProfileStore};
pub use stream::StateStream;

// Feed types consumers need without depending on the feed crate directly.
pub use proxyhost_feed::{EventRecord, FeedEndpoint, FeedState, ReconnectConfig, ReplaySubscription};
