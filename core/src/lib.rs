//! # Activity Stream Core
//!
//! Broker-agnostic building blocks for the activity event integration layer.
//!
//! This crate defines the wire envelope for domain events, the closed
//! vocabulary of event types, and the router that dispatches decoded
//! envelopes to per-type handlers. It deliberately knows nothing about
//! Kafka: the `activity-stream-kafka` crate owns connections, publishing
//! and the consumption loop, and calls into the types defined here.
//!
//! ## Core Concepts
//!
//! - **Envelope**: every domain event travels as a JSON envelope with a
//!   stable shape (`event_type`, `event_id`, `timestamp`, `data`)
//! - **Event vocabulary**: event types form a closed set per aggregate,
//!   `<aggregate>.<created|updated|deleted>`
//! - **Router**: decodes raw payloads and dispatches to registered
//!   handlers; unknown types are logged and dropped, never redelivered
//! - **Environment**: time is injected via the [`environment::Clock`]
//!   trait so publish timestamps are testable
//!
//! ## Example
//!
//! ```
//! use activity_stream_core::envelope::EventEnvelope;
//! use activity_stream_core::event::{ACTIVITY, EventKind, event_type};
//! use activity_stream_core::router::EventRouter;
//!
//! let mut router = EventRouter::new();
//! router.register(event_type(ACTIVITY, EventKind::Created), |envelope| {
//!     println!("created: {}", envelope.data);
//!     Ok(())
//! });
//!
//! let envelope = EventEnvelope::new(
//!     event_type(ACTIVITY, EventKind::Created),
//!     serde_json::json!({ "id": 1, "name": "driving range" }),
//! );
//! router.dispatch(&envelope)?;
//! # Ok::<(), activity_stream_core::router::HandlerError>(())
//! ```

pub mod envelope;
pub mod event;
pub mod router;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use envelope::{EnvelopeError, EventEnvelope};
pub use event::{ACTIVITY, EventKind, event_type};
pub use router::{EventRouter, HandlerError};

/// Environment traits - injected dependencies for testability.
///
/// The only ambient dependency of this layer is time: publish timestamps
/// must be the current UTC instant at publish time, never caller-supplied.
/// Injecting the clock keeps that property testable with a fixed clock.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability.
    ///
    /// Production code uses [`SystemClock`]; tests use a fixed clock from
    /// the `activity-stream-testing` crate.
    pub trait Clock: Send + Sync {
        /// Get the current time.
        fn now(&self) -> DateTime<Utc>;
    }

    /// System clock backed by [`Utc::now`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_is_utc() {
        let before = chrono::Utc::now();
        let now = SystemClock.now();
        let after = chrono::Utc::now();
        assert!(before <= now && now <= after);
    }
}
