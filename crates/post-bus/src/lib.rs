//! # Post Bus - Shared Broadcast Medium
//!
//! An in-process stand-in for a one-way "post message" channel: every frame
//! published on the bus is delivered to every current subscriber, including
//! the subscriber that published it.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Context A   │                    │  Context B   │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!        ↑               ▼                    ↑
//!        │         ┌──────────────┐          │
//!        │         │ InMemoryBus  │          │
//!        └──────── │              │ ─────────┘
//!     (self echo)  └──────────────┘  subscribe()
//! ```
//!
//! Frames are opaque `serde_json::Value`s. The bus knows nothing about the
//! protocol running on top of it; unrelated consumers may share it and see
//! each other's traffic.
//!
//! ## Delivery
//!
//! - No acknowledgement and no delivery guarantee
//! - A subscriber that falls more than `capacity` frames behind loses the
//!   oldest frames (logged, never surfaced as an error)
//! - Frames published before a subscription exists are not replayed

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod subscriber;

pub use publisher::InMemoryBus;
pub use subscriber::{FrameStream, Subscription, SubscriptionError};

/// Maximum frames to buffer per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
