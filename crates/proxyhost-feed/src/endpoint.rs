//! Addressing for the engine's event endpoint.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Where an engine serves its event feed, minus the port.
///
/// The port comes from whichever instance is currently active, so it is
/// supplied per connection via [`url_for`](Self::url_for).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedEndpoint {
    /// `ws` or `wss`.
    pub scheme: String,
    /// Host the engine listens on; loopback unless declared otherwise.
    pub host: String,
    /// Request path of the event stream.
    pub path: String,
}

impl Default for FeedEndpoint {
    fn default() -> Self {
        Self {
            scheme: "ws".into(),
            host: "127.0.0.1".into(),
            path: "/events".into(),
        }
    }
}

impl FeedEndpoint {
    /// Build `<scheme>://<host>:<port><path>`.
    pub fn url_for(&self, port: u16) -> Result<Url, Error> {
        if port == 0 {
            return Err(Error::InvalidEndpoint {
                url: format!("{}://{}:0{}", self.scheme, self.host, self.path),
                reason: "port must be non-zero".into(),
            });
        }

        let raw = format!("{}://{}:{port}{}", self.scheme, self.host, self.path);
        let url = Url::parse(&raw)?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::InvalidEndpoint {
                url: raw,
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url)
    }
}
