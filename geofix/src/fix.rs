//! Core data types: provider identifiers and position fixes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named location-sensing source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Satellite-based positioning (GNSS).
    Satellite,
    /// Network-based positioning (cell towers, Wi-Fi).
    Network,
    /// Piggy-backs on fixes requested by other consumers of the host.
    Passive,
}

impl ProviderId {
    /// All known providers.
    pub const ALL: [ProviderId; 3] = [
        ProviderId::Satellite,
        ProviderId::Network,
        ProviderId::Passive,
    ];

    /// Lowercase name used in configuration files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Satellite => "satellite",
            ProviderId::Network => "network",
            ProviderId::Passive => "passive",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown provider '{0}' (expected one of: satellite, network, passive)")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderId {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "satellite" | "gps" => Ok(ProviderId::Satellite),
            "network" => Ok(ProviderId::Network),
            "passive" => Ok(ProviderId::Passive),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// A position as reported by the host, before it is attributed to a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPosition {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy_m: f32,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl RawPosition {
    /// Create a raw position stamped with the current wall-clock time.
    pub fn now(latitude: f64, longitude: f64, accuracy_m: f32) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// One reported position observation.
///
/// Immutable once created; the service forwards fixes without filtering
/// or fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub provider: ProviderId,
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy_m: f32,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl Fix {
    /// Attribute a raw host position to a provider.
    pub fn from_raw(provider: ProviderId, raw: RawPosition) -> Self {
        Self {
            provider,
            latitude: raw.latitude,
            longitude: raw.longitude,
            accuracy_m: raw.accuracy_m,
            timestamp_ms: raw.timestamp_ms,
        }
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:.6}, {:.6} ±{:.0}m @ {}",
            self.provider, self.latitude, self.longitude, self.accuracy_m, self.timestamp_ms
        )
    }
}

/// Provider status carried by status-changed notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Available,
    TemporarilyUnavailable,
    OutOfService,
}
