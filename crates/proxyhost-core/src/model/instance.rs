// ── Instance configuration records ──
//
// `ConnectionParams` is the fingerprint of a multi-instance record: the
// engine rebuilds a handle only when these fields change. Everything else on
// `InstanceConfig` is presentation or selection state.

use std::fmt;
use std::net::SocketAddr;

use secrecy::{ExposeSecret, SecretString};

use super::id::InstanceId;
use crate::error::CoreError;

/// Parameters a proxy instance is built from.
///
/// The key is compared by value but never printed.
#[derive(Clone)]
pub struct ConnectionParams {
    pub server_host: String,
    pub server_port: u16,
    pub key: SecretString,
    /// Local listen address, `host:port`.
    pub bind_address: String,
}

impl ConnectionParams {
    pub fn new(
        server_host: impl Into<String>,
        server_port: u16,
        key: impl Into<String>,
        bind_address: impl Into<String>,
    ) -> Self {
        Self {
            server_host: server_host.into(),
            server_port,
            key: SecretString::from(key.into()),
            bind_address: bind_address.into(),
        }
    }

    /// The bind address parsed as a socket address.
    pub fn bind_socket_addr(&self) -> Result<SocketAddr, CoreError> {
        self.bind_address.parse().map_err(|e: std::net::AddrParseError| {
            CoreError::validation("bind_address", format!("'{}': {e}", self.bind_address))
        })
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.server_host.trim().is_empty() {
            return Err(CoreError::validation("server_host", "must not be empty"));
        }
        if self.server_port == 0 {
            return Err(CoreError::validation("server_port", "must be between 1 and 65535"));
        }
        if self.key.expose_secret().is_empty() {
            return Err(CoreError::validation("key", "must not be empty"));
        }
        self.bind_socket_addr()?;
        Ok(())
    }
}

impl PartialEq for ConnectionParams {
    fn eq(&self, other: &Self) -> bool {
        self.server_host == other.server_host
            && self.server_port == other.server_port
            && self.key.expose_secret() == other.key.expose_secret()
            && self.bind_address == other.bind_address
    }
}

impl Eq for ConnectionParams {}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("key", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .finish()
    }
}

/// One named proxy instance as the user configured it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub id: InstanceId,
    pub name: String,
    pub enabled: bool,
    /// Whether the proxy tunnels over WebSocket. Not part of the fingerprint.
    pub use_websocket: bool,
    pub params: ConnectionParams,
}

impl InstanceConfig {
    /// A fresh, enabled record with a generated id.
    pub fn new(name: impl Into<String>, params: ConnectionParams) -> Self {
        Self {
            id: InstanceId::generate(),
            name: name.into(),
            enabled: true,
            use_websocket: false,
            params,
        }
    }

    pub fn with_id(mut self, id: impl Into<InstanceId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.as_str().is_empty() {
            return Err(CoreError::validation("id", "must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("name", "must not be empty"));
        }
        self.params.validate()
    }
}
