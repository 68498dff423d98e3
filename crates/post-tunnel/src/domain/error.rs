//! Error types for the correlation engine.

use crate::domain::message_id::MessageId;
use std::time::Duration;
use thiserror::Error;

/// Invalid engine configuration. Fatal to construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Tunnel name {name:?} contains reserved separator '{separator}'")]
    ReservedSeparator { name: String, separator: char },

    #[error("Tunnel name cannot be empty")]
    EmptyTunnel,

    #[error("Invalid answer timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid echo window: {0}")]
    InvalidEchoWindow(String),
}

/// A frame could not be handed to the transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("No subscribers on transport, frame dropped")]
    NoSubscribers,

    #[error("Transport closed")]
    Closed,

    #[error("Transport error: {0}")]
    Other(String),
}

/// Errors surfaced by the correlation engine.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("No answer to {request_id} within {timeout:?}")]
    ResponseTimeout {
        request_id: MessageId,
        timeout: Duration,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode answer to {request_id}: {source}")]
    Decode {
        request_id: MessageId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Engine disposed before an answer to {request_id} arrived")]
    Disposed { request_id: MessageId },

    #[error("Engine must be created inside a Tokio runtime")]
    NoRuntime,
}

impl TunnelError {
    /// True for `ResponseTimeout`.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ResponseTimeout { .. })
    }
}

pub type TunnelResult<T> = Result<T, TunnelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = TunnelError::ResponseTimeout {
            request_id: MessageId::from("1-1000"),
            timeout: Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), "No answer to 1-1000 within 50ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_config_error_converts() {
        let err: TunnelError = ConfigError::EmptyTunnel.into();
        assert!(matches!(err, TunnelError::Configuration(ConfigError::EmptyTunnel)));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err: TunnelError = TransportError::Closed.into();
        assert_eq!(err.to_string(), "Transport closed");
    }
}
