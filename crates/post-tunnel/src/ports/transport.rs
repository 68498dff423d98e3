//! Outbound Port (Driven Port)
//!
//! The one-way broadcast medium the engine runs on. The engine owns no
//! transport state; it only needs to push frames and observe every frame,
//! its own included.

use crate::domain::TransportError;
use futures::stream::BoxStream;
use serde_json::Value;
use std::sync::Arc;

/// Every frame observed on the medium, in delivery order.
pub type FrameStream = BoxStream<'static, Value>;

/// Fire-and-forget broadcast medium.
///
/// Contract:
/// - `broadcast` enqueues a frame for every current subscriber, the caller's
///   own subscription included. No acknowledgement, no delivery guarantee.
/// - `subscribe` yields every frame broadcast after the call returns.
///   Delivery is not required to be synchronous with `broadcast`.
pub trait Transport: Send + Sync + 'static {
    /// Enqueue a frame for delivery.
    fn broadcast(&self, frame: Value) -> Result<(), TransportError>;

    /// Observe all frames broadcast from now on.
    fn subscribe(&self) -> FrameStream;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn broadcast(&self, frame: Value) -> Result<(), TransportError> {
        (**self).broadcast(frame)
    }

    fn subscribe(&self) -> FrameStream {
        (**self).subscribe()
    }
}
