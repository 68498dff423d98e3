//! # Frame Publisher
//!
//! The publishing side of the bus.

use crate::subscriber::{FrameStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// In-memory broadcast bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer fan-out.
/// Every subscriber receives every frame, the publisher's own subscription
/// included.
pub struct InMemoryBus {
    /// Broadcast sender for frames.
    sender: broadcast::Sender<Value>,

    /// Total frames published.
    frames_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with specified capacity.
    ///
    /// A capacity of zero is raised to one, the smallest `broadcast` allows.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            frames_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Publish a frame to every current subscriber.
    ///
    /// # Returns
    ///
    /// The number of subscribers the frame was queued for. Zero means the
    /// frame was dropped.
    pub fn publish(&self, frame: Value) -> usize {
        // Always increment counter (frame was attempted)
        self.frames_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(frame) {
            Ok(receivers) => {
                debug!(receivers, "Frame published");
                receivers
            }
            Err(e) => {
                warn!(error = %e, "Frame dropped (no subscribers)");
                0
            }
        }
    }

    /// Subscribe to every frame published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        debug!(
            subscribers = self.sender.receiver_count() + 1,
            "New subscription created"
        );
        Subscription::new(self.sender.subscribe())
    }

    /// Subscribe and get the frames as a `Stream`.
    #[must_use]
    pub fn frame_stream(&self) -> FrameStream {
        self.subscribe().into_stream()
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the total number of frames published.
    #[must_use]
    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_no_subscribers() {
        let bus = InMemoryBus::new();

        let receivers = bus.publish(json!({"hello": "world"}));
        assert_eq!(receivers, 0);
        assert_eq!(bus.frames_published(), 1);
    }

    #[test]
    fn test_publish_with_subscriber() {
        let bus = InMemoryBus::new();

        // Create subscriber BEFORE publishing
        let _sub = bus.subscribe();

        let receivers = bus.publish(json!(1));
        assert_eq!(receivers, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_multiple_subscribers() {
        let bus = InMemoryBus::new();

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        let _stream = bus.frame_stream();

        let receivers = bus.publish(json!("frame"));
        assert_eq!(receivers, 3);
        assert_eq!(bus.subscriber_count(), 3);
    }

    #[test]
    fn test_custom_capacity() {
        assert_eq!(InMemoryBus::with_capacity(100).capacity(), 100);
        assert_eq!(InMemoryBus::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.frames_published(), 0);
    }
}
