// ── Server profiles ──
//
// Single-active-profile variant: a list of profiles, at most one selected,
// plus the local ports the engine listens on.

use serde::{Deserialize, Serialize};
use url::Url;

use super::id::ProfileId;
use crate::error::CoreError;

pub const DEFAULT_HTTP_PROXY_PORT: u16 = 8080;
pub const DEFAULT_SOCKS5_PROXY_PORT: u16 = 1080;
pub const DEFAULT_API_SERVER_PORT: u16 = 3010;

/// Upstream endpoints for one named profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub main_server_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_server_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tailscale_server_url: Option<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>, main_server_url: impl Into<String>) -> Self {
        Self {
            id: ProfileId::generate(),
            name: name.into(),
            main_server_url: main_server_url.into(),
            ai_server_url: None,
            tailscale_server_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("name", "must not be empty"));
        }
        validate_url("main_server_url", &self.main_server_url)?;
        if let Some(url) = &self.ai_server_url {
            validate_url("ai_server_url", url)?;
        }
        if let Some(url) = &self.tailscale_server_url {
            validate_url("tailscale_server_url", url)?;
        }
        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    Url::parse(value).map_err(|e| CoreError::validation(field, format!("'{value}': {e}")))?;
    Ok(())
}

/// Every profile plus the selection and local ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSet {
    pub profiles: Vec<Profile>,
    pub enabled_profile_id: Option<ProfileId>,
    pub http_proxy_port: u16,
    pub socks5_proxy_port: u16,
    pub api_server_port: u16,
}

impl Default for ProfileSet {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            enabled_profile_id: None,
            http_proxy_port: DEFAULT_HTTP_PROXY_PORT,
            socks5_proxy_port: DEFAULT_SOCKS5_PROXY_PORT,
            api_server_port: DEFAULT_API_SERVER_PORT,
        }
    }
}

impl ProfileSet {
    pub fn profile(&self, id: &ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|p| &p.id == id)
    }

    /// The selected profile, if the selection resolves.
    pub fn enabled_profile(&self) -> Option<&Profile> {
        self.enabled_profile_id
            .as_ref()
            .and_then(|id| self.profile(id))
    }

    /// Factory input for the selected profile, or `None` with no selection.
    pub fn params(&self) -> Option<ProfileParams> {
        self.enabled_profile().map(|profile| ProfileParams {
            http_proxy_port: self.http_proxy_port,
            socks5_proxy_port: self.socks5_proxy_port,
            api_server_port: self.api_server_port,
            main_server_url: profile.main_server_url.clone(),
            ai_server_url: profile.ai_server_url.clone(),
            tailscale_server_url: profile.tailscale_server_url.clone(),
        })
    }

    /// Ports must be non-zero and pairwise distinct.
    pub fn validate_ports(&self) -> Result<(), CoreError> {
        let ports = [
            ("http_proxy_port", self.http_proxy_port),
            ("socks5_proxy_port", self.socks5_proxy_port),
            ("api_server_port", self.api_server_port),
        ];
        for (i, (field, port)) in ports.iter().enumerate() {
            if *port == 0 {
                return Err(CoreError::validation(*field, "must be between 1 and 65535"));
            }
            if let Some((other, _)) = ports.iter().skip(i + 1).find(|(_, p)| p == port) {
                return Err(CoreError::validation(
                    *field,
                    format!("port {port} is also used by {other}"),
                ));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.validate_ports()?;
        for profile in &self.profiles {
            profile.validate()?;
        }
        if let Some(id) = &self.enabled_profile_id {
            if self.profile(id).is_none() {
                return Err(CoreError::NotFound {
                    entity_type: "profile".into(),
                    identifier: id.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// What the factory needs to start the engine for the selected profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileParams {
    pub http_proxy_port: u16,
    pub socks5_proxy_port: u16,
    pub api_server_port: u16,
    pub main_server_url: String,
    pub ai_server_url: Option<String>,
    pub tailscale_server_url: Option<String>,
}
