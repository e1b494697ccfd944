//! Event type vocabulary for domain events.
//!
//! Event types form a closed set per domain aggregate: the aggregate name
//! suffixed with one of `created`, `updated` or `deleted`, for example
//! `activity.created`. Publishers and the router both build type strings
//! through [`event_type`] so the vocabulary stays in one place.

use std::fmt;

/// The activity aggregate name.
///
/// The only aggregate currently publishing events. Additional aggregates
/// add their own constant here and register their handlers with the router.
pub const ACTIVITY: &str = "activity";

/// The kind of mutation a domain event describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The aggregate was created.
    Created,
    /// The aggregate was updated.
    Updated,
    /// The aggregate was deleted.
    Deleted,
}

impl EventKind {
    /// The stable event-type suffix for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the qualified event type for an aggregate and mutation kind.
///
/// # Examples
///
/// ```
/// use activity_stream_core::event::{ACTIVITY, EventKind, event_type};
///
/// assert_eq!(event_type(ACTIVITY, EventKind::Created), "activity.created");
/// ```
#[must_use]
pub fn event_type(aggregate: &str, kind: EventKind) -> String {
    format!("{aggregate}.{kind}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_suffixes_are_stable() {
        assert_eq!(EventKind::Created.as_str(), "created");
        assert_eq!(EventKind::Updated.as_str(), "updated");
        assert_eq!(EventKind::Deleted.as_str(), "deleted");
    }

    #[test]
    fn event_type_joins_aggregate_and_kind() {
        assert_eq!(event_type(ACTIVITY, EventKind::Updated), "activity.updated");
        assert_eq!(event_type("bay_session", EventKind::Deleted), "bay_session.deleted");
    }
}
