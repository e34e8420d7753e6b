use thiserror::Error;

/// Top-level error type for the `proxyhost-feed` crate.
///
/// Connection-level failures are retried by the reconnect loop and never
/// escape it; they surface here so the loop can log them and so callers
/// that build URLs get a typed error.
#[derive(Debug, Error)]
pub enum Error {
    // ── Addressing ──────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The URL parsed but cannot address a feed (wrong scheme, no host).
    #[error("Invalid feed endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// An established connection ended. Drops without a close frame are
    /// reported with code 1006.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// A text frame could not be decoded into an event record.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}
