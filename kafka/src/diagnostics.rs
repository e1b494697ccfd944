//! Read-only connectivity diagnostics.
//!
//! Operators never see broker failures through the CRUD path; this report
//! is the diagnostic boundary that exposes the resolved configuration and
//! the enabled/disabled flag without mutating any state.

use serde::Serialize;

use crate::connection::BrokerConnection;

/// Snapshot of the broker configuration and connection health.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    /// Active deployment profile.
    pub profile: String,
    /// Configured broker addresses.
    pub bootstrap_servers: Vec<String>,
    /// Transport security mode, e.g. `"PLAINTEXT"`.
    pub security_protocol: String,
    /// Topic for activity events.
    pub topic: String,
    /// Consumer group identifier.
    pub group_id: String,
    /// Whether the integration layer is enabled.
    pub enabled: bool,
    /// The error from the startup probe, when one occurred.
    pub last_probe_error: Option<String>,
}

impl BrokerConnection {
    /// Report configuration values and the current enabled flag.
    #[must_use]
    pub fn report(&self) -> ConnectivityReport {
        let state = self.state_snapshot();
        let config = self.config();
        ConnectivityReport {
            profile: config.profile.clone(),
            bootstrap_servers: config.bootstrap_servers.clone(),
            security_protocol: config.security_protocol.as_str().to_string(),
            topic: config.topic.clone(),
            group_id: config.group_id.clone(),
            enabled: state.enabled,
            last_probe_error: state.last_probe_error,
        }
    }
}
