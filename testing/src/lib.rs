//! # Activity Stream Testing
//!
//! Testing utilities and helpers for the activity-stream workspace.
//!
//! This crate provides:
//! - A fixed clock for deterministic publish timestamps
//! - A recording sink that captures envelopes dispatched by the router
//! - Envelope builders and logging setup for tests
//!
//! ## Example
//!
//! ```
//! use activity_stream_core::router::EventRouter;
//! use activity_stream_testing::helpers::sample_envelope;
//! use activity_stream_testing::mocks::RecordingSink;
//!
//! let sink = RecordingSink::new();
//! let mut router = EventRouter::new();
//! router.register("activity.created", sink.handler());
//!
//! router.dispatch(&sample_envelope("activity.created")).ok();
//! assert_eq!(sink.events().len(), 1);
//! ```

use chrono::{DateTime, Utc};
use activity_stream_core::environment::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use std::sync::{Arc, Mutex, PoisonError};

    use activity_stream_core::envelope::EventEnvelope;
    use activity_stream_core::router::HandlerError;

    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use activity_stream_testing::mocks::FixedClock;
    /// use activity_stream_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC).
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Captures every envelope handed to its handler.
    ///
    /// Register the handler with a router, dispatch, then inspect
    /// [`RecordingSink::events`].
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        events: Arc<Mutex<Vec<EventEnvelope>>>,
    }

    impl RecordingSink {
        /// Create an empty sink.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A router handler that records each envelope and succeeds.
        #[must_use]
        pub fn handler(
            &self,
        ) -> impl Fn(&EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static {
            let events = Arc::clone(&self.events);
            move |envelope| {
                events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(envelope.clone());
                Ok(())
            }
        }

        /// Snapshot of the envelopes recorded so far.
        #[must_use]
        pub fn events(&self) -> Vec<EventEnvelope> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use std::io;
    use std::sync::{Arc, Mutex, PoisonError};

    use activity_stream_core::envelope::EventEnvelope;

    use super::mocks::test_clock;
    use activity_stream_core::environment::Clock;

    /// Build a minimal envelope for the given event type with a fixed
    /// timestamp and a small entity payload.
    #[must_use]
    pub fn sample_envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::with_parts(
            event_type,
            "00000000-0000-0000-0000-000000000001",
            test_clock().now(),
            serde_json::json!({ "id": 1, "name": "driving range" }),
        )
    }

    /// Initialize a compact tracing subscriber for tests.
    ///
    /// Safe to call from multiple tests; only the first call installs the
    /// subscriber.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    }

    /// Captures formatted log output so tests can assert on log contents.
    ///
    /// Install the subscriber for the scope under test, then inspect
    /// [`LogCapture::contents`]:
    ///
    /// ```
    /// use activity_stream_testing::helpers::LogCapture;
    ///
    /// let logs = LogCapture::new();
    /// {
    ///     let _guard = tracing::subscriber::set_default(logs.subscriber());
    ///     tracing::info!("event logged: type=activity.created");
    /// }
    /// assert!(logs.contents().contains("type=activity.created"));
    /// ```
    #[derive(Debug, Clone, Default)]
    pub struct LogCapture {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl LogCapture {
        /// Create an empty capture.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// A subscriber writing into this capture.
        ///
        /// Install with `tracing::subscriber::set_default` and keep the
        /// guard alive for the scope being asserted on.
        #[must_use]
        pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
            let buffer = Arc::clone(&self.buffer);
            tracing_subscriber::fmt()
                .with_ansi(false)
                .without_time()
                .with_writer(move || BufferWriter(Arc::clone(&buffer)))
                .finish()
        }

        /// Everything written so far, lossily decoded.
        #[must_use]
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(
                &self.buffer.lock().unwrap_or_else(PoisonError::into_inner),
            )
            .into_owned()
        }
    }

    struct BufferWriter(Arc<Mutex<Vec<u8>>>);

    impl io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
