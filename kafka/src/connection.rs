//! Broker connection lifecycle and supervision.
//!
//! [`BrokerConnection`] owns the producer and consumer handles for the
//! process. It is constructed exactly once during application startup via
//! [`BrokerConnection::connect`] and shared as an `Arc` by every
//! collaborator; there is no hidden global singleton.
//!
//! Initialization probes broker reachability with a bounded timeout. A
//! failed probe is NOT a fatal startup condition: the connection stays
//! disabled for the process lifetime, publish calls degrade to local
//! logging, the consumer refuses to start, and the rest of the
//! application keeps running. Recovery requires a process restart; there
//! is no automatic re-probe.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::{FutureProducer, Producer};
use rdkafka::util::Timeout;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::BrokerConfig;

/// Bounded timeout for the startup reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for flushing in-flight messages at shutdown.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised by connection lifecycle operations.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to flush or close the underlying handles at shutdown.
    #[error("failed to close broker connection: {0}")]
    CloseFailed(String),
}

/// Mutable connection state, guarded by a reader/writer lock.
///
/// Many concurrent publishers read the enabled flag; only initialization
/// and shutdown write it.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionState {
    pub(crate) enabled: bool,
    pub(crate) last_probe_error: Option<String>,
}

/// Process-wide broker connection owning the producer and consumer handles.
pub struct BrokerConnection {
    config: BrokerConfig,
    pub(crate) producer: Option<FutureProducer>,
    pub(crate) consumer: Option<StreamConsumer>,
    state: RwLock<ConnectionState>,
}

impl BrokerConnection {
    /// Resolve handles from the given configuration and probe the broker.
    ///
    /// Never fails: any broker-side error during initialization disables
    /// the integration layer for the process lifetime and is reported
    /// through logs and [`BrokerConnection::report`] only. CRUD operations
    /// must never fail because the broker is down.
    #[must_use]
    pub fn connect(config: BrokerConfig) -> Self {
        let mut enabled = true;
        let mut last_error = None;

        let producer = match build_producer(&config) {
            Ok(producer) => Some(producer),
            Err(e) => {
                warn!(error = %e, "failed to create producer, events degrade to local logging");
                enabled = false;
                last_error = Some(e.to_string());
                None
            }
        };

        let consumer = match build_consumer(&config) {
            Ok(consumer) => Some(consumer),
            Err(e) => {
                warn!(error = %e, "failed to create consumer, events degrade to local logging");
                enabled = false;
                last_error = Some(e.to_string());
                None
            }
        };

        if let Some(producer) = producer.as_ref().filter(|_| enabled) {
            match probe(producer, &config) {
                Ok(()) => {
                    info!(
                        profile = %config.profile,
                        brokers = %config.servers_csv(),
                        topic = %config.topic,
                        "broker connection initialized"
                    );
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        brokers = %config.servers_csv(),
                        "broker connection failed, events will be logged but not published"
                    );
                    enabled = false;
                    last_error = Some(e);
                }
            }
        }

        Self {
            config,
            producer,
            consumer,
            state: RwLock::new(ConnectionState {
                enabled,
                last_probe_error: last_error,
            }),
        }
    }

    /// Whether the integration layer is enabled.
    ///
    /// Read under the shared lock; false for the remainder of the process
    /// once the initial probe has failed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled
    }

    /// The resolved configuration this connection was built from.
    #[must_use]
    pub const fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Close the producer then the consumer, aggregating the last error.
    ///
    /// Safe to call once at shutdown even when initialization never
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::CloseFailed`] with the last error seen
    /// while flushing in-flight messages.
    pub fn close(&self) -> Result<(), ConnectionError> {
        let mut last_error = None;

        if let Some(producer) = &self.producer {
            if let Err(e) = producer.flush(Timeout::After(FLUSH_TIMEOUT)) {
                error!(error = %e, "failed to flush producer at shutdown");
                last_error = Some(e.to_string());
            }
        }
        if let Some(consumer) = &self.consumer {
            use rdkafka::consumer::Consumer;
            consumer.unsubscribe();
        }

        // Publishers observing the flag after close fall back to logging.
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled = false;

        info!("broker connection closed");
        last_error.map_or(Ok(()), |e| Err(ConnectionError::CloseFailed(e)))
    }

    pub(crate) fn state_snapshot(&self) -> ConnectionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Build a connection with lazily created handles and no probe.
    /// Unit tests use this to exercise the enabled/disabled paths without
    /// a reachable broker.
    #[cfg(test)]
    pub(crate) fn for_tests(config: BrokerConfig, enabled: bool) -> Self {
        let producer = build_producer(&config).ok();
        let consumer = build_consumer(&config).ok();
        Self {
            config,
            producer,
            consumer,
            state: RwLock::new(ConnectionState {
                enabled,
                last_probe_error: if enabled {
                    None
                } else {
                    Some("probe skipped in tests".to_string())
                },
            }),
        }
    }
}

/// Apply the transport security settings shared by both client roles.
fn apply_security(client_config: &mut ClientConfig, config: &BrokerConfig) {
    client_config.set("security.protocol", config.security_protocol.as_str());

    // Resolution only yields credentials for non-plaintext protocols.
    if let Some(sasl) = &config.sasl {
        client_config
            .set("sasl.mechanism", sasl.mechanism.as_str())
            .set("sasl.username", &sasl.username)
            .set("sasl.password", &sasl.password);
    }
}

fn build_producer(config: &BrokerConfig) -> Result<FutureProducer, String> {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.servers_csv())
        .set("client.id", &config.client_id)
        .set("acks", config.acks.as_str())
        .set("message.send.max.retries", config.retries.to_string())
        .set(
            "retry.backoff.ms",
            config.retry_backoff.as_millis().to_string(),
        );
    apply_security(&mut client_config, config);

    client_config
        .create()
        .map_err(|e| format!("failed to create producer: {e}"))
}

fn build_consumer(config: &BrokerConfig) -> Result<StreamConsumer, String> {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.servers_csv())
        .set("client.id", &config.client_id)
        .set("group.id", &config.group_id)
        .set("auto.offset.reset", config.offset_reset.as_str())
        .set(
            "enable.auto.commit",
            if config.auto_commit { "true" } else { "false" },
        )
        .set(
            "auto.commit.interval.ms",
            config.auto_commit_interval.as_millis().to_string(),
        )
        .set("enable.partition.eof", "false");
    apply_security(&mut client_config, config);

    client_config
        .create()
        .map_err(|e| format!("failed to create consumer: {e}"))
}

/// Bounded-timeout reachability probe against the configured topic.
fn probe(producer: &FutureProducer, config: &BrokerConfig) -> Result<(), String> {
    producer
        .client()
        .fetch_metadata(Some(&config.topic), PROBE_TIMEOUT)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
