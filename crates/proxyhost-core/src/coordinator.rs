// ── Service coordinator ──
//
// Turns the engine's published view into start/stop calls for whatever
// background service the host runs alongside it, and surfaces new failure
// diagnostics exactly once each.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::model::EngineStatus;

/// Callbacks into the host. Called from the coordinator task only.
pub trait ServiceHooks: Send + Sync + 'static {
    fn start_service(&self);
    fn stop_service(&self);
    fn report_failure(&self, message: &str);
}

/// Hooks that only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl ServiceHooks for LoggingHooks {
    fn start_service(&self) {
        tracing::info!("service up");
    }

    fn stop_service(&self) {
        tracing::info!("service down");
    }

    fn report_failure(&self, message: &str) {
        tracing::error!(%message, "engine failure");
    }
}

/// Owns the observation task.
pub struct ServiceCoordinator {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ServiceCoordinator {
    pub fn spawn<S, H>(state: watch::Receiver<Arc<S>>, hooks: H) -> Self
    where
        S: EngineStatus,
        H: ServiceHooks,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(observe(state, hooks, cancel.clone()));
        Self { cancel, task }
    }

    /// Stop observing. A service that was started is stopped first.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "coordinator task ended abnormally");
        }
    }
}

async fn observe<S: EngineStatus, H: ServiceHooks>(
    mut state: watch::Receiver<Arc<S>>,
    hooks: H,
    cancel: CancellationToken,
) {
    let mut running = false;
    let mut reported: HashSet<String> = HashSet::new();

    loop {
        let view = Arc::clone(&state.borrow_and_update());

        let should_run = view.is_running();
        if should_run != running {
            running = should_run;
            if running {
                hooks.start_service();
            } else {
                hooks.stop_service();
            }
        }

        let failures = view.failures();
        for message in &failures {
            if !reported.contains(message) {
                hooks.report_failure(message);
            }
        }
        // Forget cleared failures so a recurrence is reported again.
        reported = failures.into_iter().collect();

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    cancel.cancelled().await;
                    break;
                }
            }
        }
    }

    if running {
        hooks.stop_service();
    }
}
