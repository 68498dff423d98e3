//! Tunnel scoping: isolation between named tunnels, global engines seeing all.

use post_bus::InMemoryBus;
use post_tunnel::{ConfigError, CorrelationEngine, EngineConfig, TunnelError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn scoped(bus: &Arc<InMemoryBus>, tunnel: &str) -> CorrelationEngine<Value> {
    CorrelationEngine::new(Arc::clone(bus), EngineConfig::for_tunnel(tunnel)).unwrap()
}

fn global(bus: &Arc<InMemoryBus>) -> CorrelationEngine<Value> {
    CorrelationEngine::new(Arc::clone(bus), EngineConfig::global()).unwrap()
}

fn counting(engine: &CorrelationEngine<Value>, answer: &'static str) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    engine.on_receive_sync(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(json!(answer))
    });
    calls
}

#[tokio::test]
async fn test_request_ids_carry_tunnel_prefix() {
    let bus = Arc::new(InMemoryBus::new());
    let a = scoped(&bus, "a");
    let g = global(&bus);

    let scoped_id = a.post(json!(1)).unwrap().request_id;
    let global_id = g.post(json!(1)).unwrap().request_id;

    assert!(scoped_id.as_str().starts_with("a_"));
    assert_eq!(scoped_id.tunnel(), Some("a"));
    assert_eq!(global_id.tunnel(), None);
}

#[tokio::test(start_paused = true)]
async fn test_other_tunnel_never_sees_requests() {
    let bus = Arc::new(InMemoryBus::new());
    let a_client = scoped(&bus, "a");
    let a_server = scoped(&bus, "a");
    let b_server = scoped(&bus, "b");

    let a_calls = counting(&a_server, "from a");
    let b_calls = counting(&b_server, "from b");

    let answer = a_client.post(json!("q")).unwrap().answer.await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(answer, json!("from a"));
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    assert!(b_server.stats().tunnel_filtered >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_scoped_requester_ignores_other_tunnel_answers() {
    let bus = Arc::new(InMemoryBus::new());
    let a_client = scoped(&bus, "a");

    let posted = a_client
        .post_with_timeout(json!("q"), Duration::from_millis(50))
        .unwrap();

    // A well-formed answer, but scoped to tunnel "b".
    bus.publish(json!({
        "marker": true,
        "id": "b_forged",
        "tunnel": "b",
        "replyTo": posted.request_id.as_str(),
        "data": "wrong tunnel",
    }));

    assert!(posted.answer.await.unwrap_err().is_timeout());
    assert_eq!(a_client.stats().tunnel_filtered, 1);
    assert_eq!(a_client.stats().orphan_answers, 0);
}

#[tokio::test]
async fn test_global_engine_serves_every_tunnel() {
    let bus = Arc::new(InMemoryBus::new());
    let a_client = scoped(&bus, "a");
    let b_client = scoped(&bus, "b");
    let hub = global(&bus);

    let hub_calls = counting(&hub, "hub");

    let from_a = a_client.post(json!(1)).unwrap().answer.await.unwrap();
    let from_b = b_client.post(json!(2)).unwrap().answer.await.unwrap();

    assert_eq!(from_a, json!("hub"));
    assert_eq!(from_b, json!("hub"));
    assert_eq!(hub_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_global_requester_accepts_scoped_answers() {
    let bus = Arc::new(InMemoryBus::new());
    let hub = global(&bus);
    let a_server = scoped(&bus, "a");
    counting(&a_server, "a answered");

    let answer = hub.post(json!("anyone?")).unwrap().answer.await.unwrap();
    assert_eq!(answer, json!("a answered"));
}

#[tokio::test]
async fn test_invalid_tunnel_names_rejected() {
    let bus = Arc::new(InMemoryBus::new());

    let with_separator =
        CorrelationEngine::<Value>::new(Arc::clone(&bus), EngineConfig::for_tunnel("a_b"));
    assert!(matches!(
        with_separator,
        Err(TunnelError::Configuration(ConfigError::ReservedSeparator { .. }))
    ));

    let empty = CorrelationEngine::<Value>::new(bus, EngineConfig::for_tunnel(""));
    assert!(matches!(
        empty,
        Err(TunnelError::Configuration(ConfigError::EmptyTunnel))
    ));
}
