use std::sync::Arc;

use tokio::sync::watch;

use super::Published;
use crate::error::CoreError;
use crate::model::{InstanceConfig, InstanceId};

/// Ordered instance configurations, published on every change.
pub struct InstanceStore {
    records: Published<Vec<InstanceConfig>>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self {
            records: Published::new(Vec::new()),
        }
    }

    /// Seed the store, rejecting the whole list if any record is invalid.
    pub fn with_records(records: Vec<InstanceConfig>) -> Result<Self, CoreError> {
        let store = Self::new();
        store.replace_all(records)?;
        Ok(store)
    }

    pub fn snapshot(&self) -> Arc<Vec<InstanceConfig>> {
        self.records.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<InstanceConfig>>> {
        self.records.subscribe()
    }

    pub fn get(&self, id: &InstanceId) -> Option<InstanceConfig> {
        self.snapshot().iter().find(|r| &r.id == id).cloned()
    }

    /// Insert or update by id. New records are appended.
    pub fn save(&self, config: InstanceConfig) -> Result<(), CoreError> {
        config.validate()?;
        self.records.update(|records| {
            match records.iter_mut().find(|r| r.id == config.id) {
                Some(existing) => *existing = config,
                None => records.push(config),
            }
            Ok(())
        })
    }

    pub fn delete(&self, id: &InstanceId) -> Result<InstanceConfig, CoreError> {
        self.records.update(|records| {
            let index = position(records, id)?;
            Ok(records.remove(index))
        })
    }

    pub fn set_enabled(&self, id: &InstanceId, enabled: bool) -> Result<(), CoreError> {
        self.records.update(|records| {
            let index = position(records, id)?;
            if let Some(record) = records.get_mut(index) {
                record.enabled = enabled;
            }
            Ok(())
        })
    }

    /// Swap in a whole new list, e.g. after reloading the config file.
    pub fn replace_all(&self, next: Vec<InstanceConfig>) -> Result<(), CoreError> {
        for (i, record) in next.iter().enumerate() {
            record.validate()?;
            if next.iter().skip(i + 1).any(|other| other.id == record.id) {
                return Err(CoreError::validation("id", format!("duplicate id '{}'", record.id)));
            }
        }
        self.records.update(|records| {
            *records = next;
            Ok(())
        })
    }
}

impl Default for InstanceStore {
    fn default() -> Self {
        Self::new()
    }
}

fn position(records: &[InstanceConfig], id: &InstanceId) -> Result<usize, CoreError> {
    records
        .iter()
        .position(|r| &r.id == id)
        .ok_or_else(|| CoreError::NotFound {
            entity_type: "instance".into(),
            identifier: id.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ConnectionParams;
    use pretty_assertions::assert_eq;

    fn record(id: &str) -> InstanceConfig {
        InstanceConfig::new(id, ConnectionParams::new("h", 443, "k", "127.0.0.1:1080")).with_id(id)
    }

    #[test]
    fn save_appends_then_replaces_in_place() {
        let store = InstanceStore::new();
        store.save(record("a")).unwrap();
        store.save(record("b")).unwrap();

        let mut renamed = record("a");
        renamed.name = "renamed".into();
        store.save(renamed).unwrap();

        let snapshot = store.snapshot();
        let names: Vec<_> = snapshot.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["renamed", "b"]);
    }

    #[test]
    fn invalid_record_is_not_published() {
        let store = InstanceStore::new();
        let rx = store.subscribe();
        let mut bad = record("a");
        bad.params.server_port = 0;

        assert!(matches!(store.save(bad), Err(CoreError::Validation { .. })));
        assert!(!rx.has_changed().unwrap());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn set_enabled_and_delete() {
        let store = InstanceStore::with_records(vec![record("a"), record("b")]).unwrap();

        store.set_enabled(&"a".into(), false).unwrap();
        assert!(!store.get(&"a".into()).unwrap().enabled);

        let removed = store.delete(&"b".into()).unwrap();
        assert_eq!(removed.id.as_str(), "b");
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = InstanceStore::new();
        assert!(matches!(store.delete(&"x".into()), Err(CoreError::NotFound { .. })));
        assert!(matches!(
            store.set_enabled(&"x".into(), true),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn replace_all_rejects_duplicate_ids() {
        let store = InstanceStore::new();
        let err = store.replace_all(vec![record("a"), record("a")]).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }
}
