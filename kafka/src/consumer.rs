//! Cancellable consumption loop with per-message failure isolation.
//!
//! One dedicated worker owns the loop for its lifetime: Idle until
//! [`EventConsumer::consume`] is called, Running while polling, Draining
//! once cancellation is observed (the in-flight handler invocation
//! finishes), then Stopped. A fresh `consume` call starts a new run
//! reusing the same underlying consumer handle.
//!
//! Failure policy: read errors are logged and the loop continues (with a
//! short pause so an unreachable broker does not busy-loop the log);
//! handler errors are logged with the message coordinates and do not stop
//! the loop or trigger redelivery. Offsets are committed regardless of
//! handler outcome, so processing is at-most-once effective even though
//! delivery is at-least-once.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer};
use rdkafka::message::{BorrowedMessage, Message};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use activity_stream_core::router::HandlerError;

use crate::connection::BrokerConnection;

/// Pause between consecutive read errors to bound log volume.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Errors raised when starting a consumption run.
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// Subscribing the consumer to the configured topic failed.
    #[error("failed to subscribe to topic '{topic}': {cause}")]
    Subscribe {
        /// The configured topic.
        topic: String,
        /// The underlying broker error.
        cause: String,
    },
}

/// One inbound message, owned for the duration of a handler invocation.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message was read from.
    pub topic: String,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Message key, if any (the publisher sets it to the event type).
    pub key: Option<Vec<u8>>,
    /// Raw message payload.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    fn from_borrowed(message: &BorrowedMessage<'_>) -> Self {
        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }

    /// The key rendered for logging.
    #[must_use]
    pub fn key_lossy(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }
}

/// Runs the cancellable read loop against the shared broker connection.
pub struct EventConsumer {
    connection: Arc<BrokerConnection>,
}

impl EventConsumer {
    /// Create a consumer over the shared connection.
    #[must_use]
    pub const fn new(connection: Arc<BrokerConnection>) -> Self {
        Self { connection }
    }

    /// Run the consumption loop until cancelled.
    ///
    /// `shutdown` carries `true` (or a dropped sender) to request
    /// cancellation; the check is cooperative, at loop top and while
    /// blocked on the read. An already-cancelled signal returns before any
    /// blocking read is issued. When the connection is disabled this
    /// degrades to a no-op worker and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumeError::Subscribe`] if the consumer cannot
    /// subscribe to the configured topic. Read and handler failures never
    /// surface here; see the module docs.
    pub async fn consume<F>(
        &self,
        mut shutdown: watch::Receiver<bool>,
        mut handler: F,
    ) -> Result<(), ConsumeError>
    where
        F: FnMut(InboundMessage) -> Result<(), HandlerError>,
    {
        if !self.connection.is_enabled() {
            warn!("event consumer is disabled");
            return Ok(());
        }
        let Some(consumer) = &self.connection.consumer else {
            error!("consumer handle not initialized");
            return Ok(());
        };

        let config = self.connection.config();
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| ConsumeError::Subscribe {
                topic: config.topic.clone(),
                cause: e.to_string(),
            })?;

        info!(
            topic = %config.topic,
            group_id = %config.group_id,
            brokers = %config.servers_csv(),
            "starting event consumer"
        );

        let mut stream = consumer.stream();

        loop {
            if *shutdown.borrow() {
                info!("event consumer shutdown requested");
                return Ok(());
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("event consumer shutdown requested");
                        return Ok(());
                    }
                }
                next = stream.next() => match next {
                    None => {
                        info!("consumer stream ended");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "error reading message");
                        tokio::time::sleep(READ_ERROR_BACKOFF).await;
                    }
                    Some(Ok(message)) => {
                        let inbound = InboundMessage::from_borrowed(&message);
                        let (topic, offset, key) =
                            (inbound.topic.clone(), inbound.offset, inbound.key_lossy());

                        info!(
                            topic = %topic,
                            partition = inbound.partition,
                            offset,
                            key = %key,
                            "received message"
                        );

                        if let Err(e) = handler(inbound) {
                            error!(
                                error = %e,
                                topic = %topic,
                                offset,
                                key = %key,
                                "error processing message"
                            );
                            // Loop continues; the message is not retried.
                        }

                        // Committed regardless of handler outcome.
                        if !config.auto_commit {
                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                warn!(error = %e, topic = %topic, offset, "failed to commit offset");
                            }
                        }
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use std::collections::HashMap;

    fn unreachable_config() -> BrokerConfig {
        // Point at a local port nothing listens on; handle creation is
        // lazy so no connection is attempted until a read is issued.
        let vars: HashMap<&str, &str> =
            [("KAFKA_BOOTSTRAP_SERVERS", "127.0.0.1:19092")].into();
        BrokerConfig::resolve_from(|key| vars.get(key).map(|v| (*v).to_string()))
    }

    #[tokio::test]
    async fn consume_returns_immediately_when_disabled() {
        let connection = Arc::new(BrokerConnection::for_tests(unreachable_config(), false));
        let consumer = EventConsumer::new(connection);
        let (_tx, rx) = watch::channel(false);

        let result = consumer.consume(rx, |_| Ok(())).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn consume_with_cancelled_signal_returns_before_reading() {
        let connection = Arc::new(BrokerConnection::for_tests(unreachable_config(), true));
        let consumer = EventConsumer::new(connection);

        let (tx, rx) = watch::channel(true);
        drop(tx);

        // Loop-top cancellation check fires before the first blocking
        // read, so this returns promptly even with no broker listening.
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            consumer.consume(rx, |_| Ok(())),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn cancellation_during_blocked_read_is_observed() {
        let connection = Arc::new(BrokerConnection::for_tests(unreachable_config(), true));
        let consumer = EventConsumer::new(connection);

        let (tx, rx) = watch::channel(false);
        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(true);
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            consumer.consume(rx, |_| Ok(())),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
        let _ = cancel.await;
    }
}
