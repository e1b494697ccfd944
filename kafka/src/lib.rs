//! Kafka integration layer for activity-stream.
//!
//! This crate bridges domain mutations to a Kafka-compatible broker. It
//! resolves broker configuration across deployment profiles, establishes
//! and supervises the producer/consumer connection with graceful
//! degradation when the broker is unreachable, publishes domain events
//! with a stable envelope, and runs a cancellable consumption loop that
//! dispatches inbound events to handlers while isolating per-message
//! failures.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐
//! │  BrokerConfig  │  profiles + overrides, resolved once
//! └───────┬────────┘
//!         │
//!         ▼
//! ┌──────────────────┐
//! │ BrokerConnection │  handles + startup probe, Arc-shared
//! └───────┬──────────┘
//!         │
//!    ┌────┴─────────────┐
//!    ▼                  ▼
//! ┌────────────────┐ ┌───────────────┐
//! │ EventPublisher │ │ EventConsumer │
//! │  (per mutation)│ │  (one worker) │
//! └────────────────┘ └───────┬───────┘
//!                            ▼
//!                     ┌─────────────┐
//!                     │ EventRouter │  (activity-stream-core)
//!                     └─────────────┘
//! ```
//!
//! # Degradation
//!
//! A failed startup probe is not fatal: the integration layer disables
//! itself for the process lifetime, publish calls log the event locally
//! and succeed, and the consumer worker becomes a no-op. The primary CRUD
//! path is never coupled to broker health; only [`PublishError`] crosses
//! the boundary, and callers must not fail their own operation on it.
//!
//! # Delivery Semantics
//!
//! - Publishing is best-effort with the producer's bounded retries and a
//!   bounded send timeout; message key = event type, so same-type events
//!   share a partition.
//! - Consumption commits offsets regardless of handler outcome: handler
//!   errors are logged, never retried. At-least-once delivery,
//!   at-most-once effective processing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use activity_stream_kafka::{BrokerConfig, BrokerConnection, EventPublisher, worker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Application startup: resolve config and connect once.
//! let connection = Arc::new(BrokerConnection::connect(BrokerConfig::resolve()));
//! let publisher = EventPublisher::new(Arc::clone(&connection));
//!
//! // CRUD collaborator: best-effort publish after a successful mutation.
//! if let Err(e) = publisher.publish_created(&serde_json::json!({ "id": 1 })).await {
//!     tracing::error!(error = %e, "publish failed, primary operation unaffected");
//! }
//!
//! // Dedicated worker task owns the consumption loop.
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let worker = tokio::spawn(worker::run(
//!     Arc::clone(&connection),
//!     worker::activity_router(),
//!     shutdown_rx,
//! ));
//!
//! // Process shutdown.
//! shutdown_tx.send(true)?;
//! worker.await??;
//! connection.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod consumer;
pub mod diagnostics;
pub mod publisher;
pub mod worker;

// Re-exports for convenience
pub use config::{AckLevel, BrokerConfig, OffsetReset, SaslCredentials, SaslMechanism, SecurityProtocol};
pub use connection::{BrokerConnection, ConnectionError};
pub use consumer::{ConsumeError, EventConsumer, InboundMessage};
pub use diagnostics::ConnectivityReport;
pub use publisher::{EventPublisher, PublishError};
