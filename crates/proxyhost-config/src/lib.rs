//! Configuration for the proxyhost binary.
//!
//! TOML file + `PROXYHOST_` environment overrides (via figment), key
//! resolution (env var → keyring → plaintext), and translation into the
//! `proxyhost_core` types the engines consume.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use proxyhost_core::{
    ConnectionParams, CoreError, FeedEndpoint, HostConfig, IngestConfig, InstanceConfig,
    InstanceId, Profile, ProfileId, ProfileSet, ReconnectConfig,
};

/// Keyring service name; entries are `<instance-id>/key`.
pub const KEYRING_SERVICE: &str = "proxyhost";

/// Environment variable prefix. Nested keys use `__`, e.g.
/// `PROXYHOST_FEED__BATCH_MS=50`.
pub const ENV_PREFIX: &str = "PROXYHOST_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no key configured for instance '{instance}'")]
    NoKey { instance: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<CoreError> for ConfigError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, reason } => Self::Validation { field, reason },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::Validation {
                field: entity_type,
                reason: format!("'{identifier}' does not exist"),
            },
            other => Self::Validation {
                field: "config".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Which engine variant `run` drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Any number of independently configured instances.
    #[default]
    Instances,
    /// One engine for the selected profile.
    Profile,
}

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub feed: FeedSettings,

    #[serde(default)]
    pub ports: Ports,

    /// Id of the selected profile.
    pub active_profile: Option<String>,

    #[serde(default)]
    pub profiles: Vec<ProfileEntry>,

    #[serde(default)]
    pub instances: Vec<InstanceEntry>,
}

/// Event feed and batching settings.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedSettings {
    pub scheme: String,
    pub host: String,
    pub path: String,
    /// Feed port to follow in instances mode.
    pub port: Option<u16>,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub history: usize,
    pub live_capacity: usize,
    pub batch_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        let endpoint = FeedEndpoint::default();
        let ingest = IngestConfig::default();
        Self {
            scheme: endpoint.scheme,
            host: endpoint.host,
            path: endpoint.path,
            port: None,
            reconnect_initial_ms: millis(ingest.reconnect.initial_delay),
            reconnect_max_ms: millis(ingest.reconnect.max_delay),
            history: ingest.history_capacity,
            live_capacity: ingest.live_capacity,
            batch_ms: millis(ingest.batch_window),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Local listen ports for profile mode.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Ports {
    pub http_proxy: u16,
    pub socks5_proxy: u16,
    pub api_server: u16,
}

impl Default for Ports {
    fn default() -> Self {
        let set = ProfileSet::default();
        Self {
            http_proxy: set.http_proxy_port,
            socks5_proxy: set.socks5_proxy_port,
            api_server: set.api_server_port,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileEntry {
    pub id: String,
    pub name: String,
    pub main_server_url: String,
    pub ai_server_url: Option<String>,
    pub tailscale_server_url: Option<String>,
}

/// One proxy instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceEntry {
    /// Stable identity. Defaults to `name` when omitted.
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub use_websocket: bool,
    pub server_host: String,
    pub server_port: u16,
    pub bind_address: String,

    /// Plaintext key. Prefer keyring or `key_env`.
    pub key: Option<String>,

    /// Environment variable name containing the key.
    pub key_env: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl InstanceEntry {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "proxyhost", "proxyhost").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("proxyhost");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path` + environment. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    tracing::debug!(path = %path.display(), instances = config.instances.len(), "config loaded");
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML at `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Key resolution ──────────────────────────────────────────────────

/// Resolve an instance key: `key_env` → keyring → plaintext.
pub fn resolve_key(entry: &InstanceEntry) -> Result<SecretString, ConfigError> {
    // 1. Entry's key_env → env var lookup
    if let Some(env_name) = &entry.key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
        tracing::debug!(instance = entry.id(), env = %env_name, "key env var not set");
    }

    // 2. System keyring
    if let Ok(keyring_entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{}/key", entry.id())) {
        if let Ok(secret) = keyring_entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(key) = &entry.key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoKey {
        instance: entry.id().to_owned(),
    })
}

// ── Translation into core types ─────────────────────────────────────

impl InstanceEntry {
    pub fn to_instance_config(&self) -> Result<InstanceConfig, ConfigError> {
        let key = resolve_key(self)?;
        let config = InstanceConfig {
            id: InstanceId::from(self.id()),
            name: self.name.clone(),
            enabled: self.enabled,
            use_websocket: self.use_websocket,
            params: ConnectionParams {
                server_host: self.server_host.clone(),
                server_port: self.server_port,
                key,
                bind_address: self.bind_address.clone(),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

impl ProfileEntry {
    pub fn to_profile(&self) -> Profile {
        Profile {
            id: ProfileId::from(self.id.as_str()),
            name: self.name.clone(),
            main_server_url: self.main_server_url.clone(),
            ai_server_url: self.ai_server_url.clone(),
            tailscale_server_url: self.tailscale_server_url.clone(),
        }
    }
}

impl Config {
    /// Every instance translated and validated, keys resolved.
    pub fn instance_records(&self) -> Result<Vec<InstanceConfig>, ConfigError> {
        self.instances
            .iter()
            .map(InstanceEntry::to_instance_config)
            .collect()
    }

    /// The profile section as a validated [`ProfileSet`].
    pub fn profile_set(&self) -> Result<ProfileSet, ConfigError> {
        let set = ProfileSet {
            profiles: self.profiles.iter().map(ProfileEntry::to_profile).collect(),
            enabled_profile_id: self.active_profile.as_deref().map(ProfileId::from),
            http_proxy_port: self.ports.http_proxy,
            socks5_proxy_port: self.ports.socks5_proxy,
            api_server_port: self.ports.api_server,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn host_config(&self) -> Result<HostConfig, ConfigError> {
        let feed = &self.feed;
        if feed.reconnect_initial_ms == 0 || feed.reconnect_max_ms < feed.reconnect_initial_ms {
            return Err(ConfigError::Validation {
                field: "feed.reconnect_*".into(),
                reason: "initial delay must be non-zero and not exceed the maximum".into(),
            });
        }

        Ok(HostConfig {
            ingest: IngestConfig {
                endpoint: FeedEndpoint {
                    scheme: feed.scheme.clone(),
                    host: feed.host.clone(),
                    path: feed.path.clone(),
                },
                reconnect: ReconnectConfig {
                    initial_delay: Duration::from_millis(feed.reconnect_initial_ms),
                    max_delay: Duration::from_millis(feed.reconnect_max_ms),
                },
                history_capacity: feed.history,
                live_capacity: feed.live_capacity,
                batch_window: Duration::from_millis(feed.batch_ms),
            },
            autostart: true,
            feed_port: feed.port,
        })
    }

    /// Check everything the selected mode needs, without starting anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.host_config()?;
        match self.mode {
            Mode::Instances => {
                let records = self.instance_records()?;
                for (i, record) in records.iter().enumerate() {
                    if records.iter().skip(i + 1).any(|r| r.id == record.id) {
                        return Err(ConfigError::Validation {
                            field: "instances".into(),
                            reason: format!("duplicate id '{}'", record.id),
                        });
                    }
                }
            }
            Mode::Profile => {
                self.profile_set()?;
            }
        }
        Ok(())
    }
}
