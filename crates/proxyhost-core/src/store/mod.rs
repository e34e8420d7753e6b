// ── Configuration stores ──
//
// Each store owns one `watch` channel holding the current snapshot. Writes
// validate a copy first and publish only if it is accepted, so engines
// never see a rejected configuration.

mod instances;
mod profiles;

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::CoreError;

pub use instances::InstanceStore;
pub use profiles::ProfileStore;

/// A validated, copy-on-write snapshot behind a `watch` channel.
struct Published<T> {
    tx: watch::Sender<Arc<T>>,
}

impl<T: Clone + Send + Sync> Published<T> {
    fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.tx.borrow())
    }

    fn subscribe(&self) -> watch::Receiver<Arc<T>> {
        self.tx.subscribe()
    }

    /// Apply `edit` to a copy; publish it only when `edit` succeeds.
    fn update<R>(
        &self,
        edit: impl FnOnce(&mut T) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let mut result = Err(CoreError::Internal("store update did not run".into()));
        self.tx.send_if_modified(|current| {
            let mut next = (**current).clone();
            match edit(&mut next) {
                Ok(value) => {
                    *current = Arc::new(next);
                    result = Ok(value);
                    true
                }
                Err(e) => {
                    result = Err(e);
                    false
                }
            }
        });
        result
    }
}
