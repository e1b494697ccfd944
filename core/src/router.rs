//! Routing of decoded envelopes to per-event-type handlers.
//!
//! The router owns a closed set of handlers, one per domain-event case.
//! Unknown event types are logged at warning level and dropped; decode
//! failures are logged and the message is treated as consumed. Neither
//! case triggers redelivery. A matched handler runs synchronously and its
//! error is returned to the caller, which logs it and moves on.

use std::collections::HashMap;

use tracing::{error, warn};

use crate::envelope::{EnvelopeError, EventEnvelope};

/// Error type returned by event handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Box<dyn Fn(&EventEnvelope) -> Result<(), HandlerError> + Send + Sync>;

/// Dispatches decoded envelopes to registered handlers.
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<String, Handler>,
}

impl EventRouter {
    /// Create a router with no registered handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for one event type.
    ///
    /// Registering the same type twice replaces the earlier handler.
    pub fn register<F>(&mut self, event_type: impl Into<String>, handler: F)
    where
        F: Fn(&EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.insert(event_type.into(), Box::new(handler));
    }

    /// Whether a handler is registered for the given event type.
    #[must_use]
    pub fn is_registered(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Decode a raw payload into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Decode`] if the payload is not valid JSON
    /// or lacks a recognizable `event_type`/`data` shape.
    pub fn decode(raw: &[u8]) -> Result<EventEnvelope, EnvelopeError> {
        EventEnvelope::from_bytes(raw)
    }

    /// Dispatch an envelope to the handler registered for its type.
    ///
    /// Unmatched types are logged at warning level and dropped.
    ///
    /// # Errors
    ///
    /// Returns the handler's error unchanged when the matched handler
    /// fails. The caller logs it; the message is still considered consumed.
    pub fn dispatch(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        match self.handlers.get(&envelope.event_type) {
            Some(handler) => handler(envelope),
            None => {
                warn!(
                    event_type = %envelope.event_type,
                    event_id = %envelope.event_id,
                    "unknown event type, dropping"
                );
                Ok(())
            }
        }
    }

    /// Decode and dispatch one raw message payload.
    ///
    /// Decode failures are logged and absorbed: the message is treated as
    /// consumed and never redelivered. This is the handler the consumer
    /// worker installs for each inbound message.
    ///
    /// # Errors
    ///
    /// Returns only handler errors, as from [`EventRouter::dispatch`].
    pub fn handle_raw(&self, raw: &[u8]) -> Result<(), HandlerError> {
        match Self::decode(raw) {
            Ok(envelope) => self.dispatch(&envelope),
            Err(e) => {
                error!(error = %e, "failed to decode event payload, dropping message");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn envelope(event_type: &str, data: serde_json::Value) -> EventEnvelope {
        EventEnvelope::new(event_type, data)
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn dispatch_routes_to_registered_handler() {
        let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut router = EventRouter::new();
        router.register("activity.updated", move |envelope| {
            sink.lock().unwrap().push(envelope.data.clone());
            Ok(())
        });

        router
            .dispatch(&envelope("activity.updated", json!({ "id": 7 })))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["id"], 7);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn unknown_event_type_is_dropped_without_dispatch() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut router = EventRouter::new();
        router.register("activity.created", move |envelope| {
            sink.lock().unwrap().push(envelope.event_type.clone());
            Ok(())
        });

        // Unrecognized type: no error, no dispatch.
        let result = router.dispatch(&envelope("activity.archived", json!({ "id": 1 })));
        assert!(result.is_ok());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_error_is_returned_to_caller() {
        let mut router = EventRouter::new();
        router.register("activity.deleted", |_| Err("boom".into()));

        let result = router.dispatch(&envelope("activity.deleted", json!({ "id": 3 })));
        assert!(result.is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn handle_raw_decodes_and_dispatches() {
        let seen: Arc<Mutex<Vec<i64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut router = EventRouter::new();
        router.register("activity.updated", move |envelope| {
            sink.lock().unwrap().push(envelope.data["id"].as_i64().unwrap_or(-1));
            Ok(())
        });

        let raw = envelope("activity.updated", json!({ "id": 7 }))
            .to_bytes()
            .unwrap();
        router.handle_raw(&raw).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn handle_raw_absorbs_decode_failures() {
        let router = EventRouter::new();
        assert!(router.handle_raw(b"{ not json").is_ok());
        assert!(router.handle_raw(br#"{"data": {}}"#).is_ok());
    }
}
