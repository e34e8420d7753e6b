//! Single-active-profile driver.
//!
//! Unlike [`InstanceEngine`](super::InstanceEngine) there is no fingerprint
//! comparison here: every pass releases the current handle and builds a new
//! one for the selected profile. Any change to the profile set, including
//! fields of profiles that are not selected, restarts the engine.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::watch;

use super::task::{Lifecycle, Reconcile};
use crate::error::{CoreError, FactoryError};
use crate::factory::ResourceFactory;
use crate::model::{Outcome, ProfileParams, ProfileSet, ProfileState};

struct Held<H> {
    resource: Option<Result<H, FactoryError>>,
    generation: u64,
}

/// Keeps at most one handle, built from the selected profile.
pub struct ProfileEngine<F: ResourceFactory<ProfileParams>> {
    factory: F,
    held: Mutex<Held<F::Handle>>,
    state: watch::Sender<Arc<ProfileState>>,
    lifecycle: Lifecycle,
}

impl<F: ResourceFactory<ProfileParams>> ProfileEngine<F> {
    pub fn new(factory: F) -> Self {
        let (state, _) = watch::channel(Arc::new(ProfileState::default()));
        Self {
            factory,
            held: Mutex::new(Held {
                resource: None,
                generation: 0,
            }),
            state,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn start(&self) {
        if self.lifecycle.set_started(true) {
            tracing::info!("profile engine started");
        }
    }

    pub fn stop(&self) {
        if self.lifecycle.set_started(false) {
            tracing::info!("profile engine stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ProfileState>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Arc<ProfileState> {
        Arc::clone(&self.state.borrow())
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().is_running()
    }

    /// Release the current handle and, if started with a selection, build a
    /// new one from `snapshot`.
    pub fn reconcile_now(&self, snapshot: &ProfileSet) -> Arc<ProfileState> {
        let desired = self.lifecycle.is_started().then_some(snapshot);
        self.apply(desired)
    }

    fn apply(&self, desired: Option<&ProfileSet>) -> Arc<ProfileState> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        match held.resource.take() {
            Some(Ok(handle)) => {
                self.factory.destroy(handle);
                tracing::info!("profile engine released");
            }
            Some(Err(_)) | None => {}
        }

        let attempt = desired.and_then(|set| {
            let params = set.params()?;
            let resource = self.factory.create(&params);
            match &resource {
                Ok(_) => tracing::info!(
                    profile = ?set.enabled_profile_id,
                    http = params.http_proxy_port,
                    socks5 = params.socks5_proxy_port,
                    api = params.api_server_port,
                    "profile engine created"
                ),
                Err(e) => tracing::warn!(
                    profile = ?set.enabled_profile_id,
                    error = %e,
                    "profile engine creation failed"
                ),
            }
            Some((set.clone(), resource))
        });

        held.generation += 1;
        let view = match attempt {
            Some((config_used, resource)) => {
                let outcome = match &resource {
                    Ok(_) => Outcome::Running,
                    Err(e) => Outcome::Failed(e.message().to_owned()),
                };
                held.resource = Some(resource);
                ProfileState {
                    generation: held.generation,
                    updated_at: Some(Utc::now()),
                    config_used: Some(config_used),
                    outcome: Some(outcome),
                }
            }
            None => ProfileState {
                generation: held.generation,
                updated_at: Some(Utc::now()),
                config_used: None,
                outcome: None,
            },
        };
        tracing::debug!(generation = view.generation, running = view.is_running(), "profile pass");

        let view = Arc::new(view);
        self.state.send_replace(Arc::clone(&view));
        view
    }

    pub fn spawn(
        self: &Arc<Self>,
        snapshots: watch::Receiver<Arc<ProfileSet>>,
    ) -> Result<(), CoreError> {
        self.lifecycle.spawn(Arc::clone(self), snapshots)
    }

    /// Stop the background task and release the handle.
    pub async fn shutdown(&self) {
        self.lifecycle.join().await;
        self.lifecycle.set_started(false);
        self.apply(None);
        tracing::info!("profile engine shut down");
    }
}

impl<F: ResourceFactory<ProfileParams>> Reconcile for ProfileEngine<F> {
    type Snapshot = ProfileSet;

    fn run_pass(&self, snapshot: &Self::Snapshot) {
        self.reconcile_now(snapshot);
    }
}
