//! # Post Tunnel
//!
//! Request/response correlation over a fire-and-forget broadcast channel.
//!
//! A "post message" medium only broadcasts: nothing answers, nothing is
//! acknowledged, and a sender hears its own frames. The correlation engine
//! turns it into an RPC-like channel: `post` returns a future that resolves
//! with the answer a remote handler sends back, or fails after a timeout.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): Pure types, no I/O
//!   - `Envelope`: Wire shape of every request and answer
//!   - `MessageId` / `HandlerId`: Tunnel-prefixed unique identifiers
//!   - `EngineConfig` / `EngineConfigBuilder`: Configuration with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `Transport`: Broadcast one frame, subscribe to all frames
//!
//! - **Service Layer** (`service/`): Orchestration
//!   - `CorrelationEngine`: post / on_receive / remove_handler
//!   - `Answer`: Future racing the answer against the deadline
//!
//! - **Adapters Layer** (`adapters/`): `Transport` over `post_bus::InMemoryBus`
//!
//! ## Invariants
//!
//! - An engine never dispatches its own requests to its own handlers
//! - A tunnel-scoped engine ignores envelopes scoped to another tunnel
//! - An answer future settles exactly once; its responder is gone afterwards
//! - Ids minted by one process are unique
//!
//! ## Usage Example
//!
//! ```ignore
//! use post_bus::InMemoryBus;
//! use post_tunnel::{CorrelationEngine, EngineConfig};
//! use std::sync::Arc;
//!
//! let bus = Arc::new(InMemoryBus::new());
//! let panel: CorrelationEngine<String> =
//!     CorrelationEngine::new(bus.clone(), EngineConfig::for_tunnel("panel"))?;
//! let page: CorrelationEngine<String> =
//!     CorrelationEngine::new(bus, EngineConfig::for_tunnel("panel"))?;
//!
//! page.on_receive_sync(|m| Some(m.to_uppercase()));
//!
//! let answer = panel.post("ping".to_string())?.answer.await?;
//! assert_eq!(answer, "PING");
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;
pub mod telemetry;

// Re-exports
pub use domain::{
    validate_tunnel_name, ConfigError, EngineConfig, EngineConfigBuilder, Envelope, EnvelopeKind,
    HandlerId, MessageId, TransportError, TunnelError, TunnelResult, DEFAULT_ANSWER_TIMEOUT,
    DEFAULT_ECHO_WINDOW, ID_SEPARATOR, MARKER_KEY,
};
pub use metrics::{EngineStats, StatsSnapshot};
pub use ports::{FrameStream, Transport};
pub use service::{Answer, CorrelationEngine, Payload, Posted};
pub use telemetry::{init_logging, LogConfig, TelemetryError};
