//! Integration tests against a real Kafka instance.
//!
//! These tests use testcontainers to spin up Kafka and validate:
//! - Startup probe success and the enabled flag
//! - Publish/consume round-trip through the envelope codec and router
//! - Graceful degradation when no broker is reachable
//!
//! # Running These Tests
//!
//! Marked `#[ignore]` by default because they require Docker and take
//! tens of seconds to spin up Kafka:
//!
//! ```bash
//! cargo test -p activity-stream-kafka --test integration_tests -- --ignored
//! ```
//!
//! # Panics
//!
//! Setup failures use `expect()`/`panic!()`, which is acceptable in test code.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};
use tokio::sync::watch;

use activity_stream_core::envelope::EventEnvelope;
use activity_stream_kafka::{BrokerConfig, BrokerConnection, EventPublisher};
use activity_stream_testing::helpers::init_tracing;
use activity_stream_testing::mocks::RecordingSink;

/// Resolve a config pointing at the given broker address, with extra
/// overrides on top.
fn config_for(brokers: &str, extra: &[(&str, &str)]) -> BrokerConfig {
    let mut vars: HashMap<String, String> = [
        ("KAFKA_BOOTSTRAP_SERVERS".to_string(), brokers.to_string()),
        // Read from the beginning so the consumer sees events published
        // before it joined the group.
        ("KAFKA_AUTO_OFFSET_RESET".to_string(), "earliest".to_string()),
    ]
    .into();
    for (key, value) in extra {
        vars.insert((*key).to_string(), (*value).to_string());
    }
    BrokerConfig::resolve_from(move |key| vars.get(key).cloned())
}

/// Connect with retries until the container accepts the startup probe.
fn wait_for_broker_ready(config: &BrokerConfig) -> Arc<BrokerConnection> {
    let max_attempts = 30;
    for attempt in 1..=max_attempts {
        let connection = BrokerConnection::connect(config.clone());
        if connection.is_enabled() {
            return Arc::new(connection);
        }
        std::thread::sleep(Duration::from_secs(1));
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
    unreachable!()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn probe_succeeds_and_enables_the_connection() {
    init_tracing();
    let container = Kafka::default().start().await.expect("start kafka");
    let port = container
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("mapped port");
    let brokers = format!("127.0.0.1:{port}");

    let connection = wait_for_broker_ready(&config_for(&brokers, &[]));
    let report = connection.report();
    assert!(report.enabled);
    assert!(report.last_probe_error.is_none());

    connection.close().expect("close should succeed");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn publish_consume_roundtrip_dispatches_to_the_router() {
    init_tracing();
    let container = Kafka::default().start().await.expect("start kafka");
    let port = container
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("mapped port");
    let brokers = format!("127.0.0.1:{port}");

    let connection = wait_for_broker_ready(&config_for(&brokers, &[]));
    let publisher = EventPublisher::new(Arc::clone(&connection));

    publisher
        .publish_created(&serde_json::json!({ "id": 1, "name": "driving range" }))
        .await
        .expect("publish should succeed");

    let sink = RecordingSink::new();
    let mut router = activity_stream_core::router::EventRouter::new();
    router.register("activity.created", sink.handler());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_connection = Arc::clone(&connection);
    let worker = tokio::spawn(async move {
        let consumer = activity_stream_kafka::EventConsumer::new(consumer_connection);
        consumer
            .consume(shutdown_rx, move |message| router.handle_raw(&message.payload))
            .await
    });

    // Poll until the event arrives, then cancel the worker.
    let mut received = Vec::new();
    for _ in 0..60 {
        received = sink.events();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    shutdown_tx.send(true).expect("send shutdown");
    worker
        .await
        .expect("worker task should join")
        .expect("consume should exit cleanly");

    assert_eq!(received.len(), 1, "expected exactly one dispatched event");
    assert_eq!(received[0].event_type, "activity.created");
    assert_eq!(received[0].data["id"], 1);
    assert_eq!(received[0].data["name"], "driving range");

    connection.close().expect("close should succeed");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn handler_failure_does_not_stop_the_loop() {
    init_tracing();
    let container = Kafka::default().start().await.expect("start kafka");
    let port = container
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("mapped port");
    let brokers = format!("127.0.0.1:{port}");

    // Auto-commit off so the explicit post-handler commit runs for every
    // message, including the one whose handler fails.
    let config = config_for(&brokers, &[("KAFKA_ENABLE_AUTO_COMMIT", "false")]);
    let connection = wait_for_broker_ready(&config);
    let publisher = EventPublisher::new(Arc::clone(&connection));

    // Same event type, so both messages share a key and therefore a
    // partition: delivery order is id 1 then id 2.
    publisher
        .publish_created(&serde_json::json!({ "id": 1 }))
        .await
        .expect("publish should succeed");
    publisher
        .publish_created(&serde_json::json!({ "id": 2 }))
        .await
        .expect("publish should succeed");

    let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut failed_once = false;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_connection = Arc::clone(&connection);
    let worker = tokio::spawn(async move {
        let consumer = activity_stream_kafka::EventConsumer::new(consumer_connection);
        consumer
            .consume(shutdown_rx, move |message| {
                let envelope = EventEnvelope::from_bytes(&message.payload)?;
                if !failed_once {
                    failed_once = true;
                    return Err("simulated handler failure".into());
                }
                sink.lock()
                    .expect("lock")
                    .push(envelope.data["id"].as_i64().unwrap_or(-1));
                Ok(())
            })
            .await
    });

    // The first message fails its handler; the second must still be read
    // and processed.
    let mut received = Vec::new();
    for _ in 0..60 {
        received = seen.lock().expect("lock").clone();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    shutdown_tx.send(true).expect("send shutdown");
    worker
        .await
        .expect("worker task should join")
        .expect("consume should exit cleanly");

    assert_eq!(received, vec![2], "second message should be handled after the first fails");

    connection.close().expect("close should succeed");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn unreachable_broker_degrades_to_logging() {
    init_tracing();
    // Nothing listens on this port; the probe must fail within its
    // bounded timeout and leave the connection disabled.
    let connection = Arc::new(BrokerConnection::connect(config_for("127.0.0.1:19099", &[])));
    assert!(!connection.is_enabled());

    let publisher = EventPublisher::new(Arc::clone(&connection));
    publisher
        .publish_created(&serde_json::json!({ "id": 1 }))
        .await
        .expect("disabled publish must succeed");

    let (_tx, rx) = watch::channel(true);
    let consumer = activity_stream_kafka::EventConsumer::new(Arc::clone(&connection));
    consumer
        .consume(rx, |_| Ok(()))
        .await
        .expect("disabled consume must succeed");

    connection.close().expect("close should succeed");
}
