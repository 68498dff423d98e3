//! Envelope and handler identifiers.
//!
//! Format: `[<tunnel>_]<unix millis>-<sequence><salt>`
//!
//! - `tunnel_` prefix only when the engine is scoped to a tunnel
//! - `sequence` is a process-wide counter, so two ids minted by the same
//!   process never collide, even within one millisecond
//! - `salt` is three random digits in `[0, 1000)`; it is the only thing
//!   separating ids minted by different processes in the same millisecond
//!   with the same sequence number (collision floor: 1 in 1000)

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reserved character separating the tunnel prefix from the rest of an id.
pub const ID_SEPARATOR: char = '_';

/// Upper bound (exclusive) of the random salt.
const SALT_RANGE: u16 = 1000;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Correlation identifier carried by every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tunnel prefix, if the id was minted by a tunnel-scoped engine.
    pub fn tunnel(&self) -> Option<&str> {
        self.0.split_once(ID_SEPARATOR).map(|(tunnel, _)| tunnel)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for MessageId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier returned by `on_receive`, used to remove the handler later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId(String);

impl HandlerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mints ids for one engine.
#[derive(Debug, Clone)]
pub(crate) struct IdGenerator {
    prefix: String,
}

impl IdGenerator {
    pub fn new(tunnel: Option<&str>) -> Self {
        let prefix = tunnel
            .map(|name| format!("{name}{ID_SEPARATOR}"))
            .unwrap_or_default();
        Self { prefix }
    }

    pub fn message_id(&self) -> MessageId {
        MessageId(self.mint())
    }

    pub fn handler_id(&self) -> HandlerId {
        HandlerId(self.mint())
    }

    fn mint(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let salt = rand::thread_rng().gen_range(0..SALT_RANGE);
        format!("{}{millis}-{sequence}{salt:03}", self.prefix)
    }
}
