//! Domain types for the correlation engine.
//!
//! Envelope, identifiers, configuration and errors. No I/O, no async.

pub mod config;
pub mod envelope;
pub mod error;
pub mod message_id;

pub use config::{
    validate_tunnel_name, EngineConfig, EngineConfigBuilder, DEFAULT_ANSWER_TIMEOUT,
    DEFAULT_ECHO_WINDOW,
};
pub use envelope::{Envelope, EnvelopeKind, MARKER_KEY};
pub use error::{ConfigError, TransportError, TunnelError, TunnelResult};
pub use message_id::{HandlerId, MessageId, ID_SEPARATOR};
