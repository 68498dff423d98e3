//! Deadlines, disposal and transport failures.

use futures::stream::{self, StreamExt};
use post_bus::InMemoryBus;
use post_tunnel::{
    CorrelationEngine, EngineConfig, EngineConfigBuilder, FrameStream, Transport, TransportError,
    TunnelError, DEFAULT_ANSWER_TIMEOUT,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Refuses every frame.
struct RefusingTransport;

impl Transport for RefusingTransport {
    fn broadcast(&self, _frame: Value) -> Result<(), TransportError> {
        Err(TransportError::Other("mailbox closed".to_string()))
    }

    fn subscribe(&self) -> FrameStream {
        stream::pending().boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_no_earlier_than_configured() {
    let bus = Arc::new(InMemoryBus::new());
    let config = EngineConfigBuilder::new()
        .answer_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let engine: CorrelationEngine<Value> = CorrelationEngine::new(bus, config).unwrap();

    let started = Instant::now();
    let posted = engine.post(json!("nobody home")).unwrap();
    let request_id = posted.request_id.clone();
    let err = posted.answer.await.unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(50));
    match err {
        TunnelError::ResponseTimeout {
            request_id: timed_out,
            timeout,
        } => {
            assert_eq!(timed_out, request_id);
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.stats().timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_timeout_is_fifteen_seconds() {
    let bus = Arc::new(InMemoryBus::new());
    let engine: CorrelationEngine<Value> =
        CorrelationEngine::new(bus, EngineConfig::global()).unwrap();

    let started = Instant::now();
    let posted = engine.post(json!(1)).unwrap();
    assert_eq!(posted.answer.timeout(), DEFAULT_ANSWER_TIMEOUT);

    assert!(posted.answer.await.unwrap_err().is_timeout());
    assert!(started.elapsed() >= Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn test_per_call_timeout_overrides_config() {
    let bus = Arc::new(InMemoryBus::new());
    let engine: CorrelationEngine<Value> =
        CorrelationEngine::new(bus, EngineConfig::global()).unwrap();

    let started = Instant::now();
    let err = engine
        .post_with_timeout(json!(1), Duration::from_millis(10))
        .unwrap()
        .answer
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_runs_even_when_not_polled() {
    let bus = Arc::new(InMemoryBus::new());
    let engine: CorrelationEngine<Value> =
        CorrelationEngine::new(bus, EngineConfig::global()).unwrap();

    let posted = engine
        .post_with_timeout(json!(1), Duration::from_millis(50))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Already past due: the first poll settles it.
    let started = Instant::now();
    assert!(posted.answer.await.unwrap_err().is_timeout());
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_dropping_answer_prunes_responder() {
    let bus = Arc::new(InMemoryBus::new());
    let engine: CorrelationEngine<Value> =
        CorrelationEngine::new(bus, EngineConfig::global()).unwrap();

    let first = engine.post(json!(1)).unwrap();
    let second = engine.post(json!(2)).unwrap();
    assert_eq!(engine.pending_count(), 2);

    drop(first);
    assert_eq!(engine.pending_count(), 1);
    assert!(engine.is_pending(&second.request_id));
}

#[tokio::test]
async fn test_dispose_rejects_pending_answers() {
    let bus = Arc::new(InMemoryBus::new());
    let engine: CorrelationEngine<Value> =
        CorrelationEngine::new(Arc::clone(&bus), EngineConfig::global()).unwrap();

    let posted = engine.post(json!(1)).unwrap();
    engine.dispose();

    let err = posted.answer.await.unwrap_err();
    assert!(matches!(err, TunnelError::Disposed { .. }));
}

#[tokio::test]
async fn test_refused_broadcast_leaves_nothing_behind() {
    let engine: CorrelationEngine<Value> =
        CorrelationEngine::new(RefusingTransport, EngineConfig::global()).unwrap();

    let err = engine.post(json!(1)).unwrap_err();

    assert!(matches!(err, TunnelError::Transport(TransportError::Other(_))));
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.suppressed_count(), 0);
}

#[test]
fn test_engine_requires_runtime() {
    let bus = Arc::new(InMemoryBus::new());
    let result = CorrelationEngine::<Value>::new(bus, EngineConfig::global());
    assert!(matches!(result, Err(TunnelError::NoRuntime)));
}

#[test]
fn test_zero_timeout_config_rejected() {
    let result = EngineConfigBuilder::new()
        .answer_timeout(Duration::ZERO)
        .build();
    assert!(result.is_err());
}
