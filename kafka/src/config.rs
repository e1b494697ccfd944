//! Broker configuration resolution.
//!
//! Configuration is resolved once per process from a named deployment
//! profile plus explicit overrides into one immutable [`BrokerConfig`].
//! Two presets ship: `local` (plaintext, unauthenticated, fixed address)
//! and `managed` (SASL over TLS, address and credentials from the
//! environment). Explicit non-empty overrides always win over the
//! selected preset; resolution itself never fails because the `local`
//! preset is always registered as the fallback.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Fixed broker address used by the `local` profile.
pub const LOCAL_BOOTSTRAP_SERVERS: &str = "kafka:29092";

/// Transport security mode for the broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityProtocol {
    /// Plaintext connection, no encryption or authentication.
    Plaintext,
    /// TLS encryption without SASL authentication.
    Ssl,
    /// SASL authentication over TLS.
    SaslSsl,
}

impl SecurityProtocol {
    /// The rdkafka string value for this protocol.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslSsl => "SASL_SSL",
        }
    }
}

impl FromStr for SecurityProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(format!("unknown security protocol: {s}")),
        }
    }
}

/// SASL mechanism for authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    /// PLAIN mechanism.
    Plain,
    /// SCRAM-SHA-256 mechanism.
    ScramSha256,
    /// SCRAM-SHA-512 mechanism.
    ScramSha512,
}

impl SaslMechanism {
    /// The rdkafka string value for this mechanism.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl FromStr for SaslMechanism {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM_SHA_256" => Ok(Self::ScramSha256),
            "SCRAM_SHA_512" => Ok(Self::ScramSha512),
            _ => Err(format!("unknown SASL mechanism: {s}")),
        }
    }
}

/// SASL credentials for authenticated profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslCredentials {
    /// Authentication mechanism.
    pub mechanism: SaslMechanism,
    /// SASL username.
    pub username: String,
    /// SASL password.
    pub password: String,
}

/// Producer acknowledgment level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckLevel {
    /// No acknowledgment.
    None,
    /// Leader acknowledgment only.
    Leader,
    /// All in-sync replicas acknowledge.
    All,
}

impl AckLevel {
    /// The rdkafka `acks` value for this level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "0",
            Self::Leader => "1",
            Self::All => "all",
        }
    }
}

impl FromStr for AckLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "none" => Ok(Self::None),
            "1" | "leader" => Ok(Self::Leader),
            "all" | "-1" => Ok(Self::All),
            _ => Err(format!("unknown ack level: {s}")),
        }
    }
}

/// Where a consumer group starts reading when no committed offset exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    /// Start from the beginning of the topic.
    Earliest,
    /// Start from the end, only new events.
    Latest,
}

impl OffsetReset {
    /// The rdkafka `auto.offset.reset` value for this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

impl FromStr for OffsetReset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            _ => Err(format!("unknown offset reset policy: {s}")),
        }
    }
}

/// Immutable broker configuration, built once per process.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Name of the active deployment profile.
    pub profile: String,
    /// Ordered list of broker addresses.
    pub bootstrap_servers: Vec<String>,
    /// Transport security mode.
    pub security_protocol: SecurityProtocol,
    /// SASL credentials; `None` means SASL is skipped (TLS may still apply).
    pub sasl: Option<SaslCredentials>,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Producer acknowledgment level.
    pub acks: AckLevel,
    /// Producer retry count (the producer makes `retries + 1` attempts).
    pub retries: u32,
    /// Backoff between producer retries.
    pub retry_backoff: Duration,
    /// Topic for activity events.
    pub topic: String,
    /// Consumer group identifier.
    pub group_id: String,
    /// Offset reset policy for new consumer groups.
    pub offset_reset: OffsetReset,
    /// Whether the consumer commits offsets automatically.
    pub auto_commit: bool,
    /// Interval between automatic offset commits.
    pub auto_commit_interval: Duration,
}

impl BrokerConfig {
    /// Resolve configuration from the process environment.
    ///
    /// Never fails: unknown profiles fall back to `local` and unparsable
    /// values fall back to their defaults with a warning.
    #[must_use]
    pub fn resolve() -> Self {
        Self::resolve_from(|key| env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    ///
    /// This is the pure core of [`BrokerConfig::resolve`]; tests feed it a
    /// map instead of the environment.
    #[must_use]
    pub fn resolve_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let profile = non_empty(&lookup, "KAFKA_PROFILE").unwrap_or_else(|| "local".to_string());

        // Profile presets. Anything unrecognized falls back to `local`,
        // so a default preset is always selected.
        let (profile, mut servers, mut security) = match profile.as_str() {
            "managed" => (
                profile.clone(),
                non_empty(&lookup, "KAFKA_BOOTSTRAP_SERVERS")
                    .unwrap_or_else(|| "localhost:9092".to_string()),
                SecurityProtocol::SaslSsl,
            ),
            "local" => (
                profile.clone(),
                LOCAL_BOOTSTRAP_SERVERS.to_string(),
                SecurityProtocol::Plaintext,
            ),
            other => {
                warn!(profile = %other, "unknown broker profile, falling back to local");
                (
                    "local".to_string(),
                    LOCAL_BOOTSTRAP_SERVERS.to_string(),
                    SecurityProtocol::Plaintext,
                )
            }
        };

        // Explicit overrides win over preset values.
        if let Some(override_servers) = non_empty(&lookup, "KAFKA_BOOTSTRAP_SERVERS") {
            servers = override_servers;
        }
        if let Some(override_security) = non_empty(&lookup, "KAFKA_SECURITY_PROTOCOL") {
            match override_security.parse() {
                Ok(protocol) => security = protocol,
                Err(e) => warn!(error = %e, "ignoring invalid security protocol override"),
            }
        }

        // SASL applies only with a non-plaintext protocol and complete
        // credentials; otherwise SASL is skipped while TLS still applies.
        let sasl = if security == SecurityProtocol::Plaintext {
            None
        } else {
            let mechanism = parse_or(&lookup, "KAFKA_SASL_MECHANISM", SaslMechanism::ScramSha512);
            let username = non_empty(&lookup, "KAFKA_SASL_USERNAME");
            let password = non_empty(&lookup, "KAFKA_SASL_PASSWORD");
            match (username, password) {
                (Some(username), Some(password)) => Some(SaslCredentials {
                    mechanism,
                    username,
                    password,
                }),
                _ => {
                    warn!("SASL credentials not supplied, skipping SASL authentication");
                    None
                }
            }
        };

        Self {
            profile,
            bootstrap_servers: servers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            security_protocol: security,
            sasl,
            client_id: non_empty(&lookup, "KAFKA_CLIENT_ID")
                .unwrap_or_else(|| "activity-service".to_string()),
            acks: parse_or(&lookup, "KAFKA_ACKS", AckLevel::All),
            retries: parse_or(&lookup, "KAFKA_RETRIES", 3),
            retry_backoff: Duration::from_millis(parse_or(
                &lookup,
                "KAFKA_RETRY_BACKOFF_MS",
                100,
            )),
            topic: non_empty(&lookup, "KAFKA_ACTIVITY_EVENTS_TOPIC")
                .unwrap_or_else(|| "activity-events".to_string()),
            group_id: non_empty(&lookup, "KAFKA_CONSUMER_GROUP_ID")
                .unwrap_or_else(|| "activity-service-consumers".to_string()),
            offset_reset: parse_or(&lookup, "KAFKA_AUTO_OFFSET_RESET", OffsetReset::Earliest),
            auto_commit: parse_or(&lookup, "KAFKA_ENABLE_AUTO_COMMIT", true),
            auto_commit_interval: Duration::from_millis(parse_or(
                &lookup,
                "KAFKA_AUTO_COMMIT_INTERVAL_MS",
                1000,
            )),
        }
    }

    /// Broker addresses joined for the rdkafka `bootstrap.servers` setting.
    #[must_use]
    pub fn servers_csv(&self) -> String {
        self.bootstrap_servers.join(",")
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, key) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring unparsable configuration value");
                default
            }
        },
        None => default,
    }
}
