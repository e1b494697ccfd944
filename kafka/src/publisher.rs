//! Best-effort publishing of domain events.
//!
//! Publishing never blocks or fails the caller's primary operation: when
//! the connection is disabled the event is logged at info level and the
//! call succeeds. When enabled, the event is wrapped in an envelope with
//! a generated id and the current UTC timestamp, keyed by its event type
//! (same-type events land on a deterministic partition; this is per-type
//! ordering, not per-aggregate) and sent with a bounded timeout.
//!
//! Collaborator boundary: CRUD code calls [`EventPublisher::publish_created`],
//! [`EventPublisher::publish_updated`] or [`EventPublisher::publish_deleted`]
//! after a successful mutation and must log-and-ignore any returned error;
//! the primary operation's success is independent of publish outcome.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::producer::FutureRecord;
use rdkafka::util::Timeout;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use activity_stream_core::envelope::EventEnvelope;
use activity_stream_core::environment::{Clock, SystemClock};
use activity_stream_core::event::{ACTIVITY, EventKind, event_type};

use crate::connection::BrokerConnection;

/// Bounded send timeout, distinct from the producer's retry/backoff
/// settings (those come from [`crate::config::BrokerConfig`]).
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced to publish callers.
///
/// The only integration-layer error that crosses the boundary. Callers
/// must not propagate it as a failure of their own operation.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The payload could not be serialized into the envelope.
    #[error("failed to serialize event '{event_type}': {cause}")]
    Serialization {
        /// The event type being published.
        event_type: String,
        /// The underlying serialization error.
        cause: String,
    },

    /// The send failed after the producer exhausted its attempts.
    #[error("failed to publish event '{event_type}' to topic '{topic}': {cause}")]
    Send {
        /// The event type being published.
        event_type: String,
        /// The destination topic.
        topic: String,
        /// The underlying broker error.
        cause: String,
    },
}

/// Publishes domain events through the shared broker connection.
pub struct EventPublisher {
    connection: Arc<BrokerConnection>,
    clock: Arc<dyn Clock>,
}

impl EventPublisher {
    /// Create a publisher using the system clock.
    #[must_use]
    pub fn new(connection: Arc<BrokerConnection>) -> Self {
        Self::with_clock(connection, Arc::new(SystemClock))
    }

    /// Create a publisher with an injected clock.
    #[must_use]
    pub fn with_clock(connection: Arc<BrokerConnection>, clock: Arc<dyn Clock>) -> Self {
        Self { connection, clock }
    }

    /// Publish a domain event.
    ///
    /// When the connection is disabled this logs the event and returns
    /// success. The envelope timestamp is always the current UTC instant,
    /// never a value from `data`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when serialization fails or the send
    /// exhausts the producer's attempts. See the module docs for the
    /// caller contract.
    pub async fn publish<T: Serialize>(
        &self,
        event_type: &str,
        data: &T,
    ) -> Result<(), PublishError> {
        if !self.connection.is_enabled() {
            info!("event logged (broker disabled): type={event_type}");
            return Ok(());
        }

        let envelope = self.envelope_for(event_type, data)?;
        let payload = envelope
            .to_bytes()
            .map_err(|e| PublishError::Serialization {
                event_type: event_type.to_string(),
                cause: e.to_string(),
            })?;

        let Some(producer) = &self.connection.producer else {
            // Disabled connections are caught above; a missing handle is
            // equivalent and also degrades to logging.
            info!("event logged (broker disabled): type={event_type}");
            return Ok(());
        };

        let topic = &self.connection.config().topic;
        let record = FutureRecord::to(topic)
            .key(event_type.as_bytes())
            .payload(&payload);

        match producer.send(record, Timeout::After(SEND_TIMEOUT)).await {
            Ok((partition, offset)) => {
                debug!(
                    event_id = %envelope.event_id,
                    partition,
                    offset,
                    "event delivered"
                );
                info!("event published: type={event_type}, topic={topic}");
                Ok(())
            }
            Err((e, _)) => {
                error!(
                    error = %e,
                    event_type = %event_type,
                    topic = %topic,
                    "failed to publish event"
                );
                Err(PublishError::Send {
                    event_type: event_type.to_string(),
                    topic: topic.clone(),
                    cause: e.to_string(),
                })
            }
        }
    }

    /// Publish an `activity.created` event.
    ///
    /// # Errors
    ///
    /// See [`EventPublisher::publish`].
    pub async fn publish_created<T: Serialize>(&self, data: &T) -> Result<(), PublishError> {
        self.publish(&event_type(ACTIVITY, EventKind::Created), data).await
    }

    /// Publish an `activity.updated` event.
    ///
    /// # Errors
    ///
    /// See [`EventPublisher::publish`].
    pub async fn publish_updated<T: Serialize>(&self, data: &T) -> Result<(), PublishError> {
        self.publish(&event_type(ACTIVITY, EventKind::Updated), data).await
    }

    /// Publish an `activity.deleted` event.
    ///
    /// # Errors
    ///
    /// See [`EventPublisher::publish`].
    pub async fn publish_deleted<T: Serialize>(&self, data: &T) -> Result<(), PublishError> {
        self.publish(&event_type(ACTIVITY, EventKind::Deleted), data).await
    }

    /// Build the envelope for one publish call: generated id, clock-now
    /// UTC timestamp, caller's type and payload.
    fn envelope_for<T: Serialize>(
        &self,
        event_type: &str,
        data: &T,
    ) -> Result<EventEnvelope, PublishError> {
        let value = serde_json::to_value(data).map_err(|e| PublishError::Serialization {
            event_type: event_type.to_string(),
            cause: e.to_string(),
        })?;
        Ok(EventEnvelope::with_parts(
            event_type,
            Uuid::new_v4().to_string(),
            self.clock.now(),
            value,
        ))
    }
}
