//! In-memory service configuration.

use std::time::Duration;

use crate::fix::ProviderId;
use crate::host::UpdateRequest;

/// Default polling interval (5 seconds).
pub const DEFAULT_INTERVAL_MS: u64 = 5000;

/// Default minimum distance: deliver on every interval regardless of movement.
pub const DEFAULT_MIN_DISTANCE_M: f32 = 0.0;

/// Providers subscribed to by default.
pub const DEFAULT_PROVIDERS: [ProviderId; 2] = [ProviderId::Satellite, ProviderId::Network];

/// Default capacity of the fix and event broadcast channels.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Largest accepted broadcast channel capacity.
///
/// Channels preallocate their ring, so this also bounds per-service memory.
pub const MAX_EVENT_CAPACITY: usize = 65_536;

/// Polling parameters for one provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderSettings {
    pub provider: ProviderId,

    /// Minimum time between fixes, in milliseconds.
    pub interval_ms: u64,

    /// Minimum movement between fixes, in meters.
    pub min_distance_m: f32,
}

impl ProviderSettings {
    /// Settings for `provider` with the default interval and distance.
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            interval_ms: DEFAULT_INTERVAL_MS,
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
        }
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_min_distance_m(mut self, min_distance_m: f32) -> Self {
        self.min_distance_m = min_distance_m;
        self
    }

    /// The host registration request these settings describe.
    pub fn request(&self) -> UpdateRequest {
        UpdateRequest::new(Duration::from_millis(self.interval_ms), self.min_distance_m)
    }
}

/// Configuration fixed at service construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Providers to subscribe to, one entry per provider.
    pub providers: Vec<ProviderSettings>,

    /// Capacity of the fix and event broadcast channels. Observers that fall
    /// further behind than this lose the oldest values.
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            providers: DEFAULT_PROVIDERS
                .iter()
                .map(|p| ProviderSettings::new(*p))
                .collect(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Configuration with no providers.
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Add or replace the settings for a provider.
    pub fn with_provider(mut self, settings: ProviderSettings) -> Self {
        self.set_provider(settings);
        self
    }

    /// Set the broadcast capacity. Clamped to `1..=MAX_EVENT_CAPACITY` when
    /// the service is constructed.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Add or replace the settings for a provider, keeping its position.
    pub fn set_provider(&mut self, settings: ProviderSettings) {
        match self
            .providers
            .iter_mut()
            .find(|s| s.provider == settings.provider)
        {
            Some(existing) => *existing = settings,
            None => self.providers.push(settings),
        }
    }

    /// Settings for a provider, if configured.
    pub fn provider(&self, provider: ProviderId) -> Option<&ProviderSettings> {
        self.providers.iter().find(|s| s.provider == provider)
    }

    /// Collapse duplicate provider entries, last entry wins.
    pub fn deduplicated(&self) -> Vec<ProviderSettings> {
        let mut unique = ServiceConfig::empty();
        for settings in &self.providers {
            unique.set_provider(*settings);
        }
        unique.providers
    }
}
