// ── Engine lifecycle ──
//
// Shared by both engine variants: the started flag, the background
// reconciliation task and its cancellation. Each wake-up of the task runs
// exactly one full pass; passes never overlap because the engine serializes
// them behind its own lock.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

/// One synchronous reconciliation step against a snapshot.
pub(crate) trait Reconcile: Send + Sync + 'static {
    type Snapshot: Send + Sync + 'static;

    fn run_pass(&self, snapshot: &Self::Snapshot);
}

pub(crate) struct Lifecycle {
    started: watch::Sender<bool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (started, _) = watch::channel(false);
        Self {
            started,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        *self.started.borrow()
    }

    /// Set the flag; returns whether it changed.
    pub(crate) fn set_started(&self, value: bool) -> bool {
        self.started.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        })
    }

    pub(crate) fn spawn<R: Reconcile>(
        &self,
        engine: Arc<R>,
        snapshots: watch::Receiver<Arc<R::Snapshot>>,
    ) -> Result<(), CoreError> {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return Err(CoreError::Internal("engine task already running".into()));
        }
        if self.cancel.is_cancelled() {
            return Err(CoreError::Internal("engine has been shut down".into()));
        }

        let started = self.started.subscribe();
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(drive(engine, snapshots, started, cancel)));
        Ok(())
    }

    /// Cancel the background task and wait for it to finish.
    pub(crate) async fn join(&self) {
        self.cancel.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "engine task ended abnormally");
            }
        }
    }
}

async fn drive<R: Reconcile>(
    engine: Arc<R>,
    mut snapshots: watch::Receiver<Arc<R::Snapshot>>,
    mut started: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    loop {
        started.mark_unchanged();
        let snapshot = Arc::clone(&snapshots.borrow_and_update());
        engine.run_pass(&snapshot);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = started.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::debug!("snapshot source closed, holding current state");
                    cancel.cancelled().await;
                    break;
                }
            }
        }
    }
    tracing::debug!("engine task stopped");
}
