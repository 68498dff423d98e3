//! # Frame Subscriber
//!
//! The subscription side of the bus.

use serde_json::Value;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::warn;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was dropped.
    #[error("Bus closed")]
    Closed,
}

/// A subscription handle for receiving frames.
pub struct Subscription {
    receiver: broadcast::Receiver<Value>,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<Value>) -> Self {
        Self { receiver }
    }

    /// Receive the next frame.
    ///
    /// # Returns
    ///
    /// - `Some(frame)` - The next frame
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.receiver.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "Subscriber lagged, some frames dropped");
                }
            }
        }
    }

    /// Try to receive the next frame without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(frame))` - A frame was available
    /// - `Ok(None)` - No frame available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<Value>, SubscriptionError> {
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => return Ok(Some(frame)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(lagged = count, "Subscriber lagged, some frames dropped");
                }
            }
        }
    }

    /// Convert into a `Stream` of frames.
    #[must_use]
    pub fn into_stream(self) -> FrameStream {
        FrameStream {
            inner: BroadcastStream::new(self.receiver),
        }
    }
}

/// A stream of frames from one subscription.
///
/// Lagged gaps are logged and skipped; the stream ends when the bus is
/// dropped.
pub struct FrameStream {
    inner: BroadcastStream<Value>,
}

impl Stream for FrameStream {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(Ok(frame)) => return Poll::Ready(Some(frame)),
                Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                    warn!(lagged = count, "Frame stream lagged, some frames dropped");
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
