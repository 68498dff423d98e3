//! Engine configuration with validation.
//!
//! # Example
//!
//! ```ignore
//! use post_tunnel::EngineConfigBuilder;
//! use std::time::Duration;
//!
//! let config = EngineConfigBuilder::new()
//!     .tunnel("devtools")
//!     .answer_timeout(Duration::from_secs(5))
//!     .debug(true)
//!     .build()?;
//! ```
//!
//! Also deserializable, e.g. from JSON:
//!
//! ```json
//! { "tunnel": "devtools", "answer_timeout": "5s", "debug": true }
//! ```

use crate::domain::error::ConfigError;
use crate::domain::message_id::ID_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Answer timeout used when none is configured.
pub const DEFAULT_ANSWER_TIMEOUT: Duration = Duration::from_millis(15_000);

/// How long an own frame's id is remembered while waiting for its echo.
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_secs(60);

/// Immutable configuration of one correlation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logical channel name. `None` makes the engine a global listener.
    pub tunnel: Option<String>,
    /// How long an answer future waits before rejecting.
    #[serde(with = "humantime_serde")]
    pub answer_timeout: Duration,
    /// Emit protocol-trace events at debug level.
    pub debug: bool,
    /// How long ids awaiting their own echo are kept.
    #[serde(with = "humantime_serde")]
    pub echo_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tunnel: None,
            answer_timeout: DEFAULT_ANSWER_TIMEOUT,
            debug: false,
            echo_window: DEFAULT_ECHO_WINDOW,
        }
    }
}

impl EngineConfig {
    /// Configuration for a global (unscoped) engine.
    pub fn global() -> Self {
        Self::default()
    }

    /// Configuration for an engine scoped to `tunnel`.
    pub fn for_tunnel(tunnel: impl Into<String>) -> Self {
        Self {
            tunnel: Some(tunnel.into()),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `POST_TUNNEL_NAME`: Tunnel name (default: none, global)
    /// - `POST_TUNNEL_TIMEOUT_MS`: Answer timeout in ms (default: 15000)
    /// - `POST_TUNNEL_DEBUG`: Protocol tracing (default: false)
    ///
    /// The result is not validated; `CorrelationEngine::new` does that.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tunnel: env::var("POST_TUNNEL_NAME").ok(),
            answer_timeout: env::var("POST_TUNNEL_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.answer_timeout),
            debug: env::var("POST_TUNNEL_DEBUG")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
            echo_window: defaults.echo_window,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.tunnel {
            validate_tunnel_name(name)?;
        }

        if self.answer_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "answer_timeout cannot be 0".into(),
            ));
        }

        if self.echo_window.is_zero() {
            return Err(ConfigError::InvalidEchoWindow(
                "echo_window cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Tunnel name for log fields; `"global"` when unscoped.
    pub fn tunnel_label(&self) -> &str {
        self.tunnel.as_deref().unwrap_or("global")
    }

    pub fn with_tunnel(mut self, tunnel: impl Into<String>) -> Self {
        self.tunnel = Some(tunnel.into());
        self
    }

    pub fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Reject names that would make id prefixes ambiguous.
pub fn validate_tunnel_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyTunnel);
    }
    if name.contains(ID_SEPARATOR) {
        return Err(ConfigError::ReservedSeparator {
            name: name.to_string(),
            separator: ID_SEPARATOR,
        });
    }
    Ok(())
}

/// Builder for EngineConfig with validation
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    tunnel: Option<String>,
    answer_timeout: Option<Duration>,
    debug: Option<bool>,
    echo_window: Option<Duration>,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope the engine to a tunnel (must not contain `_`)
    pub fn tunnel(mut self, name: impl Into<String>) -> Self {
        self.tunnel = Some(name.into());
        self
    }

    pub fn answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = Some(timeout);
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = Some(enabled);
        self
    }

    pub fn echo_window(mut self, window: Duration) -> Self {
        self.echo_window = Some(window);
        self
    }

    /// Build the EngineConfig, validating all parameters
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            tunnel: self.tunnel,
            answer_timeout: self.answer_timeout.unwrap_or(defaults.answer_timeout),
            debug: self.debug.unwrap_or(defaults.debug),
            echo_window: self.echo_window.unwrap_or(defaults.echo_window),
        };

        config.validate()?;
        Ok(config)
    }
}
