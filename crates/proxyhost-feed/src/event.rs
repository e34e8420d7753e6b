//! Event records emitted by a running proxy engine.
//!
//! Each text frame on the feed carries one JSON object tagged by a `type`
//! discriminator. The engine has historically spelled the timing fields
//! `delay_mills` / `request_time_mills`; both spellings decode.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One outbound connection attempt reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventRecord {
    /// The engine reached the upstream through `outbound`.
    Connected {
        host: String,
        #[serde(default)]
        port: u16,
        outbound: String,
        #[serde(alias = "delay_mills")]
        delay_millis: u64,
        #[serde(alias = "request_time_mills")]
        request_time_millis: u64,
    },
    /// The attempt failed; `error` is the engine's diagnostic.
    #[serde(rename = "Error", alias = "Failed")]
    Failed {
        host: String,
        #[serde(default)]
        port: u16,
        outbound: String,
        #[serde(alias = "delay_mills")]
        delay_millis: u64,
        #[serde(alias = "request_time_mills")]
        request_time_millis: u64,
        error: String,
    },
}

impl EventRecord {
    pub fn host(&self) -> &str {
        match self {
            Self::Connected { host, .. } | Self::Failed { host, .. } => host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Self::Connected { port, .. } | Self::Failed { port, .. } => *port,
        }
    }

    pub fn outbound(&self) -> &str {
        match self {
            Self::Connected { outbound, .. } | Self::Failed { outbound, .. } => outbound,
        }
    }

    pub fn delay_millis(&self) -> u64 {
        match self {
            Self::Connected { delay_millis, .. } | Self::Failed { delay_millis, .. } => {
                *delay_millis
            }
        }
    }

    /// Wall-clock time of the request, in milliseconds since the Unix epoch.
    pub fn request_time_millis(&self) -> u64 {
        match self {
            Self::Connected {
                request_time_millis,
                ..
            }
            | Self::Failed {
                request_time_millis,
                ..
            } => *request_time_millis,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Connected { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Decode a single text frame.
pub fn decode(text: &str) -> Result<EventRecord, Error> {
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_connected_with_canonical_names() {
        let event = decode(
            r#"{"type":"Connected","host":"example.com","port":443,"outbound":"direct",
                "delay_millis":12,"request_time_millis":1700000000000}"#,
        )
        .unwrap();

        assert_eq!(
            event,
            EventRecord::Connected {
                host: "example.com".into(),
                port: 443,
                outbound: "direct".into(),
                delay_millis: 12,
                request_time_millis: 1_700_000_000_000,
            }
        );
        assert!(!event.is_failure());
        assert_eq!(event.error(), None);
    }

    #[test]
    fn decodes_error_with_legacy_spelling_and_missing_port() {
        let event = decode(
            r#"{"type":"Error","host":"blocked.example","outbound":"proxy",
                "delay_mills":250,"request_time_mills":42,"error":"timed out"}"#,
        )
        .unwrap();

        assert!(event.is_failure());
        assert_eq!(event.host(), "blocked.example");
        assert_eq!(event.port(), 0);
        assert_eq!(event.outbound(), "proxy");
        assert_eq!(event.delay_millis(), 250);
        assert_eq!(event.request_time_millis(), 42);
        assert_eq!(event.error(), Some("timed out"));
    }

    #[test]
    fn serializes_failure_with_error_tag() {
        let event = EventRecord::Failed {
            host: "h".into(),
            port: 1,
            outbound: "o".into(),
            delay_millis: 2,
            request_time_millis: 3,
            error: "e".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["delay_millis"], 2);
    }

    #[test]
    fn rejects_unknown_discriminator() {
        let err = decode(r#"{"type":"Mystery","host":"h"}"#).unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }

    #[test]
    fn rejects_non_json() {
        assert!(decode("not json at all").is_err());
    }
}
