//! CLI error types with miette diagnostics.
//!
//! Maps config and core errors into user-facing errors with actionable help
//! text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use proxyhost_config::ConfigError;
use proxyhost_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const FEED: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    #[diagnostic(
        code(proxyhost::validation),
        help("Fix the value in your config file, then run: proxyhost config validate")
    )]
    Validation { field: String, reason: String },

    #[error("No key configured for instance '{instance}'")]
    #[diagnostic(
        code(proxyhost::no_key),
        help(
            "Set `key_env` to an environment variable holding the key,\n\
             store it in the system keyring (service 'proxyhost', user '{instance}/key'),\n\
             or set `key` in the config file."
        )
    )]
    NoKey { instance: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(code(proxyhost::config), help("Config file: {path}"))]
    Config { path: String, message: String },

    #[error("{entity_type} '{identifier}' not found")]
    #[diagnostic(code(proxyhost::not_found))]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Event feed error: {message}")]
    #[diagnostic(
        code(proxyhost::feed),
        help("Check that the engine is running and its event API port is correct.")
    )]
    Feed { message: String },

    #[error("I/O error: {0}")]
    #[diagnostic(code(proxyhost::io))]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(proxyhost::internal))]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } | Self::NoKey { .. } | Self::Config { .. } => {
                exit_code::CONFIG
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Feed { .. } => exit_code::FEED,
            Self::Io(_) | Self::Internal(_) => exit_code::GENERAL,
        }
    }

    pub fn config(path: &std::path::Path, err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoKey { instance } => Self::NoKey { instance },
            other => Self::Config {
                path: path.display().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, reason } => Self::Validation { field, reason },
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                entity_type,
                identifier,
            },
            CoreError::Feed { message } => Self::Feed { message },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}
