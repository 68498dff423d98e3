//! # Correlation Engine
//!
//! Request/response on top of a one-way broadcast medium.
//!
//! ```text
//!  post(m)                                        remote engine
//!    │ 1. mint id, expect its echo                     │
//!    │ 2. register responder, arm deadline             │
//!    │ 3. broadcast {id, data}  ──── transport ───────▶│ 4. dispatch to each handler
//!    │    (own echo swallowed)                         │ 5. broadcast {id', replyTo: id, answer}
//!    │ 6. resolve responders for id ◀── transport ─────│    per handler that answered
//!    ▼
//!  Answer<A> settles: first of (answer, deadline)
//! ```
//!
//! Every frame on the medium goes through the same filter chain:
//! marker check, self-echo check, tunnel check, then answer or request
//! handling.

use crate::domain::message_id::IdGenerator;
use crate::domain::{
    EngineConfig, Envelope, EnvelopeKind, HandlerId, MessageId, TunnelError, TunnelResult,
};
use crate::metrics::{EngineStats, StatsSnapshot};
use crate::ports::{FrameStream, Transport};
use crate::service::echo::EchoSuppressor;
use crate::service::handlers::{BoxedHandler, HandlerRegistry};
use crate::service::pending::{PendingResponderStore, ResponderToken};
use futures::{FutureExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, warn};

/// Anything that can travel as envelope data.
pub trait Payload: Serialize + DeserializeOwned + Send + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// Result of `post`: the request id and the future of its answer.
pub struct Posted<A> {
    pub request_id: MessageId,
    pub answer: Answer<A>,
}

impl<A> fmt::Debug for Posted<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Posted")
            .field("request_id", &self.request_id)
            .field("answer", &self.answer)
            .finish()
    }
}

/// Correlation engine bound to one transport.
///
/// `M` is the request type handlers receive, `A` the answer type `post`
/// resolves to. Both ends of a conversation must agree on them.
///
/// Dropping the engine stops its listener and fails every pending answer
/// future with `TunnelError::Disposed`.
pub struct CorrelationEngine<M, A = M> {
    inner: Arc<EngineInner<M, A>>,
    listener: JoinHandle<()>,
    runtime: Handle,
}

struct EngineInner<M, A> {
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    ids: IdGenerator,
    handlers: HandlerRegistry<M, A>,
    responders: Arc<PendingResponderStore>,
    echoes: EchoSuppressor,
    stats: Arc<EngineStats>,
}

impl<M, A> CorrelationEngine<M, A>
where
    M: Payload + Clone,
    A: Payload,
{
    /// Validate `config`, subscribe to `transport` and start listening.
    ///
    /// # Errors
    ///
    /// - `TunnelError::Configuration` - invalid tunnel name or limits
    /// - `TunnelError::NoRuntime` - not called from within a Tokio runtime
    pub fn new<T: Transport>(transport: T, config: EngineConfig) -> TunnelResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| TunnelError::NoRuntime)?;

        let transport: Arc<dyn Transport> = Arc::new(transport);
        let frames = transport.subscribe();

        let inner = Arc::new(EngineInner {
            transport,
            ids: IdGenerator::new(config.tunnel.as_deref()),
            handlers: HandlerRegistry::new(),
            responders: Arc::new(PendingResponderStore::new()),
            echoes: EchoSuppressor::new(config.echo_window),
            stats: Arc::new(EngineStats::new()),
            config,
        });

        let listener = runtime.spawn(Arc::clone(&inner).listen(frames));
        protocol_debug!(inner.config, "Engine created");

        Ok(Self {
            inner,
            listener,
            runtime,
        })
    }

    /// Post a message with the configured answer timeout.
    pub fn post(&self, message: M) -> TunnelResult<Posted<A>> {
        self.post_with_timeout(message, self.inner.config.answer_timeout)
    }

    /// Post a message; its answer future rejects after `timeout`.
    ///
    /// Returns as soon as the envelope is on the transport. The deadline is
    /// fixed now, not when the answer future is first polled.
    ///
    /// # Errors
    ///
    /// - `TunnelError::Encode` - `message` does not serialize
    /// - `TunnelError::Transport` - the transport refused the frame
    pub fn post_with_timeout(&self, message: M, timeout: Duration) -> TunnelResult<Posted<A>> {
        let inner = &self.inner;
        let data = serde_json::to_value(&message).map_err(TunnelError::Encode)?;

        let request_id = inner.ids.message_id();
        let envelope = Envelope::request(request_id.clone(), inner.config.tunnel.clone(), data);

        // Both must exist before the frame can come back.
        inner.expect_echo(request_id.clone());
        let (token, receiver) = inner.responders.register(&request_id);

        if let Err(error) = inner.transport.broadcast(envelope.into_frame()) {
            inner.echoes.forget(&request_id);
            inner.responders.remove(&request_id, token);
            warn!(
                tunnel = inner.config.tunnel_label(),
                request_id = %request_id,
                error = %error,
                "Request could not be broadcast"
            );
            return Err(error.into());
        }

        EngineStats::bump(&inner.stats.posted);
        protocol_debug!(
            inner.config,
            request_id = %request_id,
            timeout_ms = timeout.as_millis(),
            "Request posted"
        );

        let deadline = {
            let _runtime = self.runtime.enter();
            Box::pin(tokio::time::sleep(timeout))
        };

        Ok(Posted {
            request_id: request_id.clone(),
            answer: Answer {
                request_id,
                token,
                receiver,
                deadline,
                timeout,
                responders: Arc::clone(&inner.responders),
                stats: Arc::clone(&inner.stats),
                settled: false,
                _answer: PhantomData,
            },
        })
    }

    /// Register a handler for incoming requests.
    ///
    /// The handler runs once per request, concurrently with other handlers
    /// and other requests. Returning `None` sends no answer.
    pub fn on_receive<F, Fut>(&self, handler: F) -> HandlerId
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<A>> + Send + 'static,
    {
        let id = self.inner.ids.handler_id();
        let boxed: BoxedHandler<M, A> = Arc::new(move |message: M| handler(message).boxed());
        self.inner.handlers.register(id.clone(), boxed);

        protocol_debug!(self.inner.config, handler_id = %id, "New handler registered");
        id
    }

    /// `on_receive` for handlers that answer without awaiting.
    pub fn on_receive_sync<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(M) -> Option<A> + Send + Sync + 'static,
    {
        self.on_receive(move |message| std::future::ready(handler(message)))
    }

    /// Remove a handler. Requests already being dispatched still reach it.
    pub fn remove_handler(&self, id: &HandlerId) -> bool {
        let removed = self.inner.handlers.remove(id);
        if removed {
            protocol_debug!(self.inner.config, handler_id = %id, "Handler removed");
        }
        removed
    }
}

impl<M, A> CorrelationEngine<M, A> {
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn tunnel(&self) -> Option<&str> {
        self.inner.config.tunnel.as_deref()
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.len()
    }

    /// Answer futures still waiting.
    pub fn pending_count(&self) -> usize {
        self.inner.responders.pending_count()
    }

    pub fn is_pending(&self, request_id: &MessageId) -> bool {
        self.inner.responders.is_pending(request_id)
    }

    /// Ids still expecting their own echo.
    pub fn suppressed_count(&self) -> usize {
        self.inner.echoes.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Stop listening and fail all pending answers. Same as dropping.
    pub fn dispose(self) {
        drop(self);
    }
}

impl<M, A> Drop for CorrelationEngine<M, A> {
    fn drop(&mut self) {
        self.listener.abort();
        self.inner.handlers.clear();
        let dropped = self.inner.responders.clear();
        debug!(
            tunnel = self.inner.config.tunnel_label(),
            dropped_responders = dropped,
            "Engine disposed"
        );
    }
}

impl<M, A> fmt::Debug for CorrelationEngine<M, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationEngine")
            .field("tunnel", &self.inner.config.tunnel)
            .field("handlers", &self.inner.handlers.len())
            .field("pending", &self.inner.responders.pending_count())
            .finish()
    }
}

impl<M, A> EngineInner<M, A>
where
    M: Payload + Clone,
    A: Payload,
{
    async fn listen(self: Arc<Self>, mut frames: FrameStream) {
        while let Some(frame) = frames.next().await {
            self.on_frame(&frame);
        }
        debug!(
            tunnel = self.config.tunnel_label(),
            "Transport stream ended, listener stopped"
        );
    }

    fn on_frame(self: &Arc<Self>, frame: &Value) {
        let Some(envelope) = Envelope::from_frame(frame) else {
            EngineStats::bump(&self.stats.foreign_frames);
            return;
        };

        if self.echoes.consume(&envelope.id) {
            EngineStats::bump(&self.stats.echoes_suppressed);
            protocol_debug!(self.config, id = %envelope.id, "Own frame echoed back, ignored");
            return;
        }

        if let (Some(ours), Some(theirs)) = (&self.config.tunnel, &envelope.tunnel) {
            if ours != theirs {
                EngineStats::bump(&self.stats.tunnel_filtered);
                protocol_debug!(
                    self.config,
                    id = %envelope.id,
                    other_tunnel = %theirs,
                    "Envelope from another tunnel, ignored"
                );
                return;
            }
        }

        match envelope.kind() {
            EnvelopeKind::Answer { reply_to } => {
                self.on_answer(&envelope.id, reply_to, &envelope.data);
            }
            EnvelopeKind::Request if self.responders.is_pending(&envelope.id) => {
                // Own request that came back after its echo id expired.
                EngineStats::bump(&self.stats.echoes_suppressed);
                protocol_debug!(
                    self.config,
                    request_id = %envelope.id,
                    "Own request echoed back late, ignored"
                );
            }
            EnvelopeKind::Request => self.on_request(envelope.id, envelope.data),
        }
    }

    fn on_answer(&self, id: &MessageId, reply_to: &MessageId, data: &Value) {
        let resolved = self.responders.resolve(reply_to, data);
        if resolved == 0 {
            // Requester timed out already, or lives in another context.
            EngineStats::bump(&self.stats.orphan_answers);
            protocol_debug!(
                self.config,
                answer_id = %id,
                request_id = %reply_to,
                "Answer received but no responders found for it"
            );
            return;
        }

        EngineStats::add(&self.stats.answers_received, resolved);
        protocol_debug!(
            self.config,
            answer_id = %id,
            request_id = %reply_to,
            responders = resolved,
            "Answer delivered"
        );
    }

    fn on_request(self: &Arc<Self>, id: MessageId, data: Value) {
        let handlers = self.handlers.snapshot();
        if handlers.is_empty() {
            protocol_debug!(self.config, request_id = %id, "Request received, no handlers registered");
            return;
        }

        let message: M = match serde_json::from_value(data) {
            Ok(message) => message,
            Err(error) => {
                protocol_debug!(
                    self.config,
                    request_id = %id,
                    error = %error,
                    "Request payload does not decode, handlers skipped"
                );
                return;
            }
        };

        protocol_debug!(
            self.config,
            request_id = %id,
            handlers = handlers.len(),
            "Request received, dispatching"
        );

        for (handler_id, handler) in handlers {
            let engine = Arc::clone(self);
            let request_id = id.clone();
            let message = message.clone();
            tokio::spawn(async move {
                match handler(message).await {
                    Some(answer) => engine.send_answer(&handler_id, request_id, answer),
                    None => protocol_debug!(
                        engine.config,
                        request_id = %request_id,
                        handler_id = %handler_id,
                        "Handler produced no answer"
                    ),
                }
            });
        }
    }

    fn send_answer(&self, handler_id: &HandlerId, request_id: MessageId, answer: A) {
        let data = match serde_json::to_value(&answer) {
            Ok(data) => data,
            Err(error) => {
                warn!(
                    tunnel = self.config.tunnel_label(),
                    request_id = %request_id,
                    handler_id = %handler_id,
                    error = %error,
                    "Handler answer does not encode, no answer sent"
                );
                return;
            }
        };

        let answer_id = self.ids.message_id();
        let envelope = Envelope::answer(
            answer_id.clone(),
            self.config.tunnel.clone(),
            data,
            request_id.clone(),
        );

        self.expect_echo(answer_id.clone());
        match self.transport.broadcast(envelope.into_frame()) {
            Ok(()) => {
                EngineStats::bump(&self.stats.answers_sent);
                protocol_debug!(
                    self.config,
                    request_id = %request_id,
                    answer_id = %answer_id,
                    handler_id = %handler_id,
                    "Handler answered"
                );
            }
            Err(error) => {
                self.echoes.forget(&answer_id);
                warn!(
                    tunnel = self.config.tunnel_label(),
                    request_id = %request_id,
                    handler_id = %handler_id,
                    error = %error,
                    "Answer could not be broadcast"
                );
            }
        }
    }
}

impl<M, A> EngineInner<M, A> {
    fn expect_echo(&self, id: MessageId) {
        let expired = self.echoes.register(id);
        if expired > 0 {
            protocol_debug!(self.config, expired, "Expired echo ids collected");
        }
    }
}

/// Future of the answer to one posted request.
///
/// Settles with the first of:
/// - an answer envelope referencing the request (`Ok`, or `Decode` error)
/// - the deadline (`ResponseTimeout`)
/// - engine disposal (`Disposed`)
///
/// Its responder registration is removed on timeout and on drop, so an
/// abandoned answer leaves nothing behind.
pub struct Answer<A> {
    request_id: MessageId,
    token: ResponderToken,
    receiver: oneshot::Receiver<Value>,
    deadline: Pin<Box<Sleep>>,
    timeout: Duration,
    responders: Arc<PendingResponderStore>,
    stats: Arc<EngineStats>,
    settled: bool,
    _answer: PhantomData<fn() -> A>,
}

impl<A> Answer<A> {
    pub fn request_id(&self) -> &MessageId {
        &self.request_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn settle(&mut self, received: Result<Value, oneshot::error::RecvError>) -> TunnelResult<A>
    where
        A: DeserializeOwned,
    {
        self.settled = true;
        match received {
            Ok(data) => serde_json::from_value(data).map_err(|source| TunnelError::Decode {
                request_id: self.request_id.clone(),
                source,
            }),
            Err(_) => Err(TunnelError::Disposed {
                request_id: self.request_id.clone(),
            }),
        }
    }
}

impl<A: DeserializeOwned> Future for Answer<A> {
    type Output = TunnelResult<A>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        if let Poll::Ready(received) = Pin::new(&mut this.receiver).poll(cx) {
            return Poll::Ready(this.settle(received));
        }

        if this.deadline.as_mut().poll(cx).is_pending() {
            return Poll::Pending;
        }

        if !this.responders.remove(&this.request_id, this.token) {
            // Resolved concurrently with the deadline; the answer wins if
            // it already landed.
            if let Ok(data) = this.receiver.try_recv() {
                return Poll::Ready(this.settle(Ok(data)));
            }
        }

        this.settled = true;
        EngineStats::bump(&this.stats.timeouts);
        Poll::Ready(Err(TunnelError::ResponseTimeout {
            request_id: this.request_id.clone(),
            timeout: this.timeout,
        }))
    }
}

impl<A> Drop for Answer<A> {
    fn drop(&mut self) {
        if !self.settled {
            self.responders.remove(&self.request_id, self.token);
        }
    }
}

impl<A> fmt::Debug for Answer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Answer")
            .field("request_id", &self.request_id)
            .field("timeout", &self.timeout)
            .field("settled", &self.settled)
            .finish()
    }
}
