// ── Socket-reserving factories ──
//
// The proxy engine itself is opaque to this binary. These factories stand
// in for it by binding the listen sockets an engine instance would own, so
// configuration conflicts (port in use, bad address) surface as per-instance
// failures and sockets are released exactly when the engine retires them.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use proxyhost_core::{ConnectionParams, FactoryError, ProfileParams, ResourceFactory};

/// A bound listener for one instance.
pub struct BoundInstance {
    listener: TcpListener,
    server: String,
}

impl BoundInstance {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

/// Binds each instance's `bind_address`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListenerFactory;

impl ResourceFactory<ConnectionParams> for ListenerFactory {
    type Handle = BoundInstance;

    fn create(&self, params: &ConnectionParams) -> Result<BoundInstance, FactoryError> {
        let addr = params
            .bind_socket_addr()
            .map_err(|e| FactoryError::new(e.to_string()))?;
        let listener = TcpListener::bind(addr)
            .map_err(|e| FactoryError::from(e).context(format!("cannot bind {addr}")))?;
        let server = format!("{}:{}", params.server_host, params.server_port);
        tracing::debug!(bind = ?listener.local_addr().ok(), %server, "listener bound");
        Ok(BoundInstance { listener, server })
    }

    fn destroy(&self, handle: BoundInstance) {
        tracing::debug!(bind = ?handle.local_addr(), server = %handle.server, "listener released");
        drop(handle);
    }
}

/// Listeners for the selected profile's HTTP and SOCKS5 proxy ports.
///
/// The event API port is left to the engine that serves the feed.
pub struct ProfileListeners {
    http: TcpListener,
    socks5: TcpListener,
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileListenerFactory {
    host: Ipv4Addr,
}

impl Default for ProfileListenerFactory {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::LOCALHOST,
        }
    }
}

impl ProfileListenerFactory {
    fn bind(&self, port: u16, what: &str) -> Result<TcpListener, FactoryError> {
        TcpListener::bind((self.host, port)).map_err(|e| {
            FactoryError::from(e).context(format!("cannot bind {what} port {port}"))
        })
    }
}

impl ResourceFactory<ProfileParams> for ProfileListenerFactory {
    type Handle = ProfileListeners;

    fn create(&self, params: &ProfileParams) -> Result<ProfileListeners, FactoryError> {
        let http = self.bind(params.http_proxy_port, "HTTP proxy")?;
        let socks5 = self.bind(params.socks5_proxy_port, "SOCKS5 proxy")?;
        tracing::debug!(upstream = %params.main_server_url, "profile listeners bound");
        Ok(ProfileListeners { http, socks5 })
    }

    fn destroy(&self, handle: ProfileListeners) {
        tracing::debug!(
            http = ?handle.http.local_addr().ok(),
            socks5 = ?handle.socks5.local_addr().ok(),
            "profile listeners released"
        );
        drop(handle);
    }
}
