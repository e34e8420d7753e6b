// ── Published engine state ──
//
// Views handed to observers. They describe what the engine built and how
// each attempt ended; they never contain resource handles.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::id::InstanceId;
use super::instance::ConnectionParams;
use super::profile::ProfileSet;

/// Aggregate view an engine publishes, as seen by its observers.
pub trait EngineStatus: Send + Sync + 'static {
    /// Whether the background service should be up.
    fn is_running(&self) -> bool;

    /// Current failure diagnostics, stable order.
    fn failures(&self) -> Vec<String>;

    /// Event feed port the engine itself advertises.
    fn active_endpoint(&self) -> Option<u16> {
        None
    }
}

/// How one creation attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Running,
    Failed(String),
}

impl Outcome {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Running => None,
            Self::Failed(message) => Some(message),
        }
    }
}

/// Status of one reconciled instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStatus {
    /// Parameters the current handle (or failed attempt) was built from.
    pub fingerprint: ConnectionParams,
    pub outcome: Outcome,
}

/// Multi-instance engine view after a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledState {
    /// Increments by one per pass.
    pub generation: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub instances: BTreeMap<InstanceId, InstanceStatus>,
}

impl ReconciledState {
    pub fn get(&self, id: &InstanceId) -> Option<&InstanceStatus> {
        self.instances.get(id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.instances
            .values()
            .filter(|s| s.outcome.is_running())
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.running_count()
    }

    /// True when at least one instance is live.
    pub fn is_running(&self) -> bool {
        self.instances.values().any(|s| s.outcome.is_running())
    }

    /// Failed instances with their diagnostics.
    pub fn failures(&self) -> impl Iterator<Item = (&InstanceId, &str)> {
        self.instances
            .iter()
            .filter_map(|(id, s)| s.outcome.failure().map(|m| (id, m)))
    }
}

impl EngineStatus for ReconciledState {
    fn is_running(&self) -> bool {
        Self::is_running(self)
    }

    fn failures(&self) -> Vec<String> {
        Self::failures(self)
            .map(|(id, message)| format!("{id}: {message}"))
            .collect()
    }
}

/// Single-profile engine view after a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileState {
    pub generation: u64,
    pub updated_at: Option<DateTime<Utc>>,
    /// The profile set the current attempt was made with.
    pub config_used: Option<ProfileSet>,
    /// `None` while stopped or with no profile selected.
    pub outcome: Option<Outcome>,
}

impl ProfileState {
    pub fn is_running(&self) -> bool {
        self.outcome.as_ref().is_some_and(Outcome::is_running)
    }

    pub fn failure(&self) -> Option<&str> {
        self.outcome.as_ref().and_then(Outcome::failure)
    }

    /// Port of the engine's event API while it is running.
    pub fn active_endpoint(&self) -> Option<u16> {
        if self.is_running() {
            self.config_used.as_ref().map(|set| set.api_server_port)
        } else {
            None
        }
    }
}

impl EngineStatus for ProfileState {
    fn is_running(&self) -> bool {
        Self::is_running(self)
    }

    fn failures(&self) -> Vec<String> {
        Self::failure(self).map(str::to_owned).into_iter().collect()
    }

    fn active_endpoint(&self) -> Option<u16> {
        Self::active_endpoint(self)
    }
}
