//! Service Layer - the correlation engine and its registries.

/// Protocol-trace event, emitted only when the engine runs with `debug`.
macro_rules! protocol_debug {
    ($config:expr, $($arg:tt)+) => {
        if $config.debug {
            tracing::debug!(tunnel = $config.tunnel_label(), $($arg)+);
        }
    };
}

mod echo;
pub mod engine;
mod handlers;
mod pending;

pub use engine::{Answer, CorrelationEngine, Payload, Posted};
