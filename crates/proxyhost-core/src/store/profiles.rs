use std::sync::Arc;

use tokio::sync::watch;

use super::Published;
use crate::error::CoreError;
use crate::model::{Profile, ProfileId, ProfileSet};

/// Profiles, the active selection and local ports.
pub struct ProfileStore {
    set: Published<ProfileSet>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self {
            set: Published::new(ProfileSet::default()),
        }
    }

    pub fn with_set(set: ProfileSet) -> Result<Self, CoreError> {
        set.validate()?;
        Ok(Self {
            set: Published::new(set),
        })
    }

    pub fn snapshot(&self) -> Arc<ProfileSet> {
        self.set.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ProfileSet>> {
        self.set.subscribe()
    }

    /// Insert or update a profile by id.
    pub fn save_profile(&self, profile: Profile) -> Result<(), CoreError> {
        profile.validate()?;
        self.set.update(|set| {
            match set.profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => *existing = profile,
                None => set.profiles.push(profile),
            }
            Ok(())
        })
    }

    /// Remove a profile. Deleting the selected profile clears the selection.
    pub fn delete_profile(&self, id: &ProfileId) -> Result<Profile, CoreError> {
        self.set.update(|set| {
            let index = set
                .profiles
                .iter()
                .position(|p| &p.id == id)
                .ok_or_else(|| not_found(id))?;
            if set.enabled_profile_id.as_ref() == Some(id) {
                set.enabled_profile_id = None;
            }
            Ok(set.profiles.remove(index))
        })
    }

    pub fn select(&self, id: Option<ProfileId>) -> Result<(), CoreError> {
        self.set.update(|set| {
            if let Some(id) = &id {
                if set.profile(id).is_none() {
                    return Err(not_found(id));
                }
            }
            set.enabled_profile_id = id;
            Ok(())
        })
    }

    pub fn set_proxy_ports(&self, http: u16, socks5: u16) -> Result<(), CoreError> {
        self.set.update(|set| {
            set.http_proxy_port = http;
            set.socks5_proxy_port = socks5;
            set.validate_ports()
        })
    }

    pub fn set_api_port(&self, port: u16) -> Result<(), CoreError> {
        self.set.update(|set| {
            set.api_server_port = port;
            set.validate_ports()
        })
    }

    /// Swap in a whole new set after validating it.
    pub fn replace(&self, next: ProfileSet) -> Result<(), CoreError> {
        next.validate()?;
        self.set.update(|set| {
            *set = next;
            Ok(())
        })
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: &ProfileId) -> CoreError {
    CoreError::NotFound {
        entity_type: "profile".into(),
        identifier: id.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn profile(id: &str) -> Profile {
        let mut p = Profile::new(id, "https://main.example.com");
        p.id = id.into();
        p
    }

    #[test]
    fn select_requires_known_profile() {
        let store = ProfileStore::new();
        assert!(matches!(
            store.select(Some("missing".into())),
            Err(CoreError::NotFound { .. })
        ));

        store.save_profile(profile("home")).unwrap();
        store.select(Some("home".into())).unwrap();
        assert_eq!(store.snapshot().enabled_profile().unwrap().name, "home");
    }

    #[test]
    fn deleting_selected_profile_clears_selection() {
        let store = ProfileStore::new();
        store.save_profile(profile("home")).unwrap();
        store.save_profile(profile("work")).unwrap();
        store.select(Some("home".into())).unwrap();

        store.delete_profile(&"work".into()).unwrap();
        assert!(store.snapshot().enabled_profile_id.is_some());

        store.delete_profile(&"home".into()).unwrap();
        assert!(store.snapshot().enabled_profile_id.is_none());
    }

    #[test]
    fn port_collisions_leave_set_untouched() {
        let store = ProfileStore::new();
        assert!(store.set_api_port(8080).is_err());
        assert!(store.set_proxy_ports(9000, 9000).is_err());
        assert_eq!(*store.snapshot(), ProfileSet::default());

        store.set_proxy_ports(9000, 9001).unwrap();
        assert_eq!(store.snapshot().socks5_proxy_port, 9001);
    }
}
