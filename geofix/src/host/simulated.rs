//! In-memory provider host.
//!
//! Holds one registration per provider and delivers positions either on
//! demand ([`SimulatedHost::emit`]) or from a background feed task that walks
//! a circle around a configurable origin.
//!
//! Listeners are always invoked outside the host lock, so a listener may call
//! back into the host without deadlocking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{ProviderHost, ProviderListener, UpdateRequest};
use crate::error::SubscriptionError;
use crate::fix::{ProviderId, ProviderStatus, RawPosition};

/// Mean Earth radius used for distance estimates.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Configuration for the simulated host feed.
#[derive(Debug, Clone)]
pub struct SimulatedHostConfig {
    /// Centre of the simulated track (latitude, longitude).
    pub origin: (f64, f64),

    /// Radius of the simulated track in degrees.
    pub radius_deg: f64,

    /// Angle advanced per delivered position, in radians.
    pub step_rad: f64,

    /// How often the feed task checks for due registrations.
    pub tick: Duration,
}

impl Default for SimulatedHostConfig {
    fn default() -> Self {
        Self {
            origin: (39.4745, -0.3581),
            radius_deg: 0.01,
            step_rad: 0.05,
            tick: Duration::from_millis(100),
        }
    }
}

struct Registration {
    request: UpdateRequest,
    listener: Arc<dyn ProviderListener>,
}

#[derive(Default)]
struct ProviderEntry {
    enabled: bool,
    registration: Option<Registration>,
    requests: usize,
    removals: usize,
}

/// A [`ProviderHost`] backed entirely by memory.
pub struct SimulatedHost {
    config: SimulatedHostConfig,
    providers: Mutex<HashMap<ProviderId, ProviderEntry>>,
}

impl SimulatedHost {
    /// Create a host offering the given providers.
    pub fn new(config: SimulatedHostConfig, providers: &[ProviderId]) -> Self {
        let providers = providers
            .iter()
            .map(|p| {
                (
                    *p,
                    ProviderEntry {
                        enabled: true,
                        ..Default::default()
                    },
                )
            })
            .collect();

        Self {
            config,
            providers: Mutex::new(providers),
        }
    }

    /// Host offering every known provider with the default feed.
    pub fn with_defaults() -> Self {
        Self::new(SimulatedHostConfig::default(), &ProviderId::ALL)
    }

    /// Host offering only the given providers with the default feed.
    pub fn with_providers(providers: &[ProviderId]) -> Self {
        Self::new(SimulatedHostConfig::default(), providers)
    }

    /// Add or remove a provider from the host.
    ///
    /// Removing a provider drops its registration without notifying anyone.
    pub fn set_available(&self, provider: ProviderId, available: bool) {
        let mut providers = self.providers.lock();
        if available {
            providers.entry(provider).or_insert_with(|| ProviderEntry {
                enabled: true,
                ..Default::default()
            });
        } else {
            providers.remove(&provider);
        }
    }

    /// Enable or disable a provider, notifying its listener.
    pub fn set_enabled(&self, provider: ProviderId, enabled: bool) {
        let listener = {
            let mut providers = self.providers.lock();
            let Some(entry) = providers.get_mut(&provider) else {
                return;
            };
            entry.enabled = enabled;
            entry.registration.as_ref().map(|r| r.listener.clone())
        };

        if let Some(listener) = listener {
            if enabled {
                listener.on_provider_enabled();
            } else {
                listener.on_provider_disabled();
            }
        }
    }

    /// Report a status change to the provider's listener.
    pub fn set_status(&self, provider: ProviderId, status: ProviderStatus) {
        if let Some(listener) = self.listener(provider) {
            listener.on_status_changed(status);
        }
    }

    /// Deliver a position to the provider's listener.
    ///
    /// Returns false when no registration exists for the provider.
    pub fn emit(&self, provider: ProviderId, position: RawPosition) -> bool {
        match self.listener(provider) {
            Some(listener) => {
                listener.on_position(position);
                true
            }
            None => false,
        }
    }

    /// Whether a registration currently exists for the provider.
    pub fn is_registered(&self, provider: ProviderId) -> bool {
        self.providers
            .lock()
            .get(&provider)
            .is_some_and(|e| e.registration.is_some())
    }

    /// Providers with a live registration, sorted.
    pub fn registered_providers(&self) -> Vec<ProviderId> {
        let mut registered: Vec<_> = self
            .providers
            .lock()
            .iter()
            .filter(|(_, e)| e.registration.is_some())
            .map(|(p, _)| *p)
            .collect();
        registered.sort();
        registered
    }

    /// Number of `request_updates` calls that reached the provider.
    pub fn request_count(&self, provider: ProviderId) -> usize {
        self.providers
            .lock()
            .get(&provider)
            .map_or(0, |e| e.requests)
    }

    /// Number of `remove_updates` calls that reached the provider.
    pub fn remove_count(&self, provider: ProviderId) -> usize {
        self.providers
            .lock()
            .get(&provider)
            .map_or(0, |e| e.removals)
    }

    fn listener(&self, provider: ProviderId) -> Option<Arc<dyn ProviderListener>> {
        self.providers
            .lock()
            .get(&provider)
            .and_then(|e| e.registration.as_ref())
            .map(|r| r.listener.clone())
    }

    /// Start a background task delivering positions to every registration.
    ///
    /// Each registration receives a position once its interval has elapsed
    /// and the track has moved at least its minimum distance since the last
    /// delivery. Disabled providers are skipped. The task exits when
    /// `shutdown` is cancelled.
    pub fn spawn_feed(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let host = Arc::clone(self);
        tokio::spawn(async move { host.run_feed(shutdown).await })
    }

    async fn run_feed(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.tick);
        let mut angle: f64 = 0.0;
        let mut last_sent: HashMap<ProviderId, (Instant, f64, f64)> = HashMap::new();

        debug!(tick_ms = self.config.tick.as_millis() as u64, "Simulated feed started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            angle += self.config.step_rad;
            let due = self.due_registrations(angle, &last_sent);

            for (provider, listener, position) in due {
                trace!(%provider, lat = position.latitude, lon = position.longitude, "Feed delivering");
                last_sent.insert(
                    provider,
                    (Instant::now(), position.latitude, position.longitude),
                );
                listener.on_position(position);
            }
        }

        debug!("Simulated feed stopped");
    }

    fn due_registrations(
        &self,
        angle: f64,
        last_sent: &HashMap<ProviderId, (Instant, f64, f64)>,
    ) -> Vec<(ProviderId, Arc<dyn ProviderListener>, RawPosition)> {
        let now = Instant::now();
        let providers = self.providers.lock();

        providers
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .filter_map(|(provider, entry)| {
                let registration = entry.registration.as_ref()?;
                let position = self.position_for(*provider, angle);

                if let Some((sent_at, lat, lon)) = last_sent.get(provider) {
                    if now.duration_since(*sent_at) < registration.request.interval {
                        return None;
                    }
                    let moved = distance_m(*lat, *lon, position.latitude, position.longitude);
                    if moved < registration.request.min_distance_m as f64 {
                        return None;
                    }
                }

                Some((*provider, registration.listener.clone(), position))
            })
            .collect()
    }

    fn position_for(&self, provider: ProviderId, angle: f64) -> RawPosition {
        let (lat0, lon0) = self.config.origin;
        let (offset, accuracy_m) = match provider {
            ProviderId::Satellite => (0.0, 5.0),
            ProviderId::Network => (0.0005, 35.0),
            ProviderId::Passive => (-0.0005, 60.0),
        };
        let latitude = lat0 + offset + self.config.radius_deg * angle.sin();
        let longitude = lon0 + offset + self.config.radius_deg * angle.cos();
        RawPosition::now(latitude, longitude, accuracy_m)
    }
}

impl ProviderHost for SimulatedHost {
    fn has_provider(&self, provider: ProviderId) -> bool {
        self.providers.lock().contains_key(&provider)
    }

    fn request_updates(
        &self,
        provider: ProviderId,
        request: &UpdateRequest,
        listener: Arc<dyn ProviderListener>,
    ) -> Result<(), SubscriptionError> {
        let mut providers = self.providers.lock();
        let entry = providers
            .get_mut(&provider)
            .ok_or(SubscriptionError::ProviderUnavailable { provider })?;

        entry.requests += 1;
        entry.registration = Some(Registration {
            request: *request,
            listener,
        });
        debug!(%provider, interval_ms = request.interval.as_millis() as u64, "Registration added");
        Ok(())
    }

    fn remove_updates(&self, provider: ProviderId) -> Result<(), SubscriptionError> {
        let mut providers = self.providers.lock();
        let entry = providers
            .get_mut(&provider)
            .ok_or(SubscriptionError::ProviderUnavailable { provider })?;

        entry.removals += 1;
        entry.registration = None;
        debug!(%provider, "Registration removed");
        Ok(())
    }
}

/// Equirectangular distance estimate, accurate enough for short hops.
fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let mean_lat = ((lat1 + lat2) / 2.0).to_radians();
    let dx = (lon2 - lon1).to_radians() * mean_lat.cos();
    let dy = (lat2 - lat1).to_radians();
    (dx * dx + dy * dy).sqrt() * EARTH_RADIUS_M
}
