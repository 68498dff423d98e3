//! `Transport` over the in-process `post_bus::InMemoryBus`.
//!
//! Share one bus between engines by wrapping it in an `Arc`; the blanket
//! `Transport for Arc<T>` impl covers the clone handed to each engine.

use crate::domain::TransportError;
use crate::ports::{FrameStream, Transport};
use futures::StreamExt;
use post_bus::InMemoryBus;
use serde_json::Value;

impl Transport for InMemoryBus {
    fn broadcast(&self, frame: Value) -> Result<(), TransportError> {
        match self.publish(frame) {
            0 => Err(TransportError::NoSubscribers),
            _ => Ok(()),
        }
    }

    fn subscribe(&self) -> FrameStream {
        self.frame_stream().boxed()
    }
}
