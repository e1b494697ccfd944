//! Wire envelope for domain events.
//!
//! Every published event is a JSON object with a stable shape:
//!
//! ```json
//! { "event_type": "activity.created",
//!   "event_id": "3e2f…",
//!   "timestamp": "2025-06-01T12:00:00Z",
//!   "data": { "id": 1, "name": "driving range" } }
//! ```
//!
//! The timestamp is always the UTC instant at publish time, never a value
//! supplied by the caller, even if `data` carries its own timestamp field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the envelope codec.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Failed to serialize an envelope to JSON bytes.
    #[error("failed to encode event envelope: {0}")]
    Encode(String),

    /// Payload is not valid JSON or lacks the required envelope shape.
    #[error("failed to decode event envelope: {0}")]
    Decode(String),
}

/// The envelope wrapping every domain event on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Qualified event type, e.g. `activity.created`. Drawn from the
    /// closed per-aggregate set in [`crate::event`].
    pub event_type: String,

    /// Unique identifier for this event instance (UUID v4).
    pub event_id: String,

    /// UTC instant at publish time, serialized as RFC 3339.
    pub timestamp: DateTime<Utc>,

    /// The domain entity or a map of changed fields.
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Create an envelope with a generated event id and the current UTC time.
    ///
    /// Publishers that need a deterministic timestamp construct the
    /// envelope through [`EventEnvelope::with_parts`] using an injected
    /// clock instead.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self::with_parts(
            event_type,
            Uuid::new_v4().to_string(),
            Utc::now(),
            data,
        )
    }

    /// Create an envelope from explicit parts.
    #[must_use]
    pub fn with_parts(
        event_type: impl Into<String>,
        event_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            event_id: event_id.into(),
            timestamp,
            data,
        }
    }

    /// Serialize the envelope to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] if serialization fails, which
    /// cannot happen for envelopes built from valid JSON values.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }

    /// Deserialize an envelope from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decode`] if the payload is not valid JSON,
    /// is missing `event_type` or `data`, or carries an empty event type.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Self =
            serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Decode(e.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Check that required fields carry usable values.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decode`] if `event_type` is empty or
    /// `data` is null.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.event_type.is_empty() {
            return Err(EnvelopeError::Decode("event_type is empty".to_string()));
        }
        if self.data.is_null() {
            return Err(EnvelopeError::Decode("data is null".to_string()));
        }
        Ok(())
    }
}
