//! Long-running consumer worker for activity events.
//!
//! The application root owns the shutdown channel and calls [`run`] from a
//! dedicated task; on process shutdown it sends `true` (or drops the
//! sender) and the worker drains cleanly. Per-message work is decoding
//! plus dispatch through the router built by [`activity_router`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use activity_stream_core::envelope::EventEnvelope;
use activity_stream_core::event::{ACTIVITY, EventKind, event_type};
use activity_stream_core::router::{EventRouter, HandlerError};

use crate::connection::BrokerConnection;
use crate::consumer::{ConsumeError, EventConsumer};

/// Build the router for the closed set of activity events.
#[must_use]
pub fn activity_router() -> EventRouter {
    let mut router = EventRouter::new();
    router.register(event_type(ACTIVITY, EventKind::Created), handle_created);
    router.register(event_type(ACTIVITY, EventKind::Updated), handle_updated);
    router.register(event_type(ACTIVITY, EventKind::Deleted), handle_deleted);
    router
}

/// Run the activity event consumer until shutdown.
///
/// Refuses to start when the connection is disabled (the worker degrades
/// to a no-op), otherwise consumes until the shutdown signal fires.
///
/// # Errors
///
/// Returns [`ConsumeError`] if the underlying consumer cannot subscribe.
pub async fn run(
    connection: Arc<BrokerConnection>,
    router: EventRouter,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ConsumeError> {
    info!("starting activity event worker");

    if !connection.is_enabled() {
        warn!("broker connection is disabled, worker will not start");
        return Ok(());
    }

    let consumer = EventConsumer::new(connection);
    consumer
        .consume(shutdown, move |message| router.handle_raw(&message.payload))
        .await?;

    info!("activity event worker stopped");
    Ok(())
}

fn handle_created(envelope: &EventEnvelope) -> Result<(), HandlerError> {
    info!(
        activity_id = ?envelope.data.get("id"),
        activity_name = ?envelope.data.get("name"),
        "handling activity created event"
    );
    // Extension point: search indices, notifications, analytics.
    Ok(())
}

fn handle_updated(envelope: &EventEnvelope) -> Result<(), HandlerError> {
    info!(
        activity_id = ?envelope.data.get("id"),
        activity_name = ?envelope.data.get("name"),
        "handling activity updated event"
    );
    Ok(())
}

fn handle_deleted(envelope: &EventEnvelope) -> Result<(), HandlerError> {
    info!(
        activity_id = ?envelope.data.get("id"),
        "handling activity deleted event"
    );
    Ok(())
}
