// ── Core error types ──
//
// Validation errors are raised by the stores before anything reaches an
// engine. Factory failures are captured per instance and never bubble out
// of a reconciliation pass; they only appear here as `FactoryError`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Feed errors (wrapped, not exposed raw) ───────────────────────
    #[error("Event feed error: {message}")]
    Feed { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<proxyhost_feed::Error> for CoreError {
    fn from(err: proxyhost_feed::Error) -> Self {
        match err {
            proxyhost_feed::Error::InvalidUrl(e) => CoreError::Validation {
                field: "feed endpoint".into(),
                reason: e.to_string(),
            },
            proxyhost_feed::Error::InvalidEndpoint { url, reason } => CoreError::Validation {
                field: "feed endpoint".into(),
                reason: format!("{url}: {reason}"),
            },
            other => CoreError::Feed {
                message: other.to_string(),
            },
        }
    }
}

/// Failure reported by a [`ResourceFactory`](crate::factory::ResourceFactory)
/// when it cannot create a handle.
///
/// Always carries a human-readable diagnostic; it is stored in the
/// reconciled state and shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FactoryError {
    message: String,
}

impl FactoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with context, keeping the original diagnostic.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        Self {
            message: format!("{context}: {}", self.message),
        }
    }
}

impl From<std::io::Error> for FactoryError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}
