//! Location service lifecycle.
//!
//! The [`LocationService`] owns one [`ProviderSubscription`] per configured
//! provider and drives them against the [`PermissionGate`] in response to a
//! driver's `start()`/`stop()` calls. Every fix delivered while running is
//! forwarded unchanged to the fix broadcast channel.
//!
//! # Lifecycle
//!
//! ```text
//!            start()                       stop()
//! Stopped ───────────► Running ─────────────────────────► Stopped
//!    ▲ │ stop()          │ start()
//!    └─┘ (unsubscribe    └─► re-evaluate gate:
//!         pass only)          suspend / resume subscriptions
//! ```
//!
//! Neither transition can fail. Per-provider errors are logged and emitted
//! as [`ServiceEvent`]s, never returned to the driver.
//!
//! # Post-stop guarantee
//!
//! Fix callbacks hold a read guard on the running flag while they update the
//! cache and broadcast. `stop()` clears the flag under the write guard, so
//! once it returns no further callback is forwarded.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::config::{ServiceConfig, MAX_EVENT_CAPACITY};
use crate::error::SubscriptionError;
use crate::fix::{Fix, ProviderId};
use crate::host::ProviderHost;
use crate::permission::PermissionGate;
use crate::subscription::{FixSink, ProviderSubscription, SubscriptionState, SubscriptionStatus};

// =============================================================================
// Events
// =============================================================================

/// Diagnostic event emitted by the service lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    /// The service transitioned to running.
    Started,
    /// The service transitioned to stopped.
    Stopped,
    /// A provider registration succeeded.
    Subscribed(ProviderId),
    /// A provider registration failed during `start()`.
    SubscribeFailed {
        provider: ProviderId,
        error: SubscriptionError,
    },
    /// A provider registration was removed during `stop()`.
    Unsubscribed(ProviderId),
    /// An unsubscribe attempt during `stop()` did not reach or satisfy the host.
    UnsubscribeSkipped {
        provider: ProviderId,
        error: SubscriptionError,
    },
    /// Forwarding paused because the permission gate now denies access.
    Suspended(ProviderId),
    /// Forwarding resumed because the permission gate allows access again.
    Resumed(ProviderId),
}

/// Point-in-time view of the whole service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatus {
    pub running: bool,
    pub subscriptions: Vec<SubscriptionStatus>,
}

impl ServiceStatus {
    /// Number of subscriptions currently forwarding fixes.
    pub fn active_count(&self) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.state == SubscriptionState::Active)
            .count()
    }
}

// =============================================================================
// Service core
// =============================================================================

/// State shared between the service handle and subscription callbacks.
struct ServiceCore {
    host: Arc<dyn ProviderHost>,
    gate: PermissionGate,

    /// Subscriptions keyed by provider; fixed at construction.
    subscriptions: HashMap<ProviderId, ProviderSubscription>,

    /// Configured provider order, used for iteration and logs.
    order: Vec<ProviderId>,

    /// Running flag. Callbacks hold the read guard while forwarding.
    running: RwLock<bool>,

    /// Serializes start/stop.
    lifecycle: Mutex<()>,

    fixes: broadcast::Sender<Fix>,
    events: broadcast::Sender<ServiceEvent>,
}

impl ServiceCore {
    fn subscriptions(&self) -> impl Iterator<Item = &ProviderSubscription> + '_ {
        self.order.iter().filter_map(|p| self.subscriptions.get(p))
    }

    fn is_running(&self) -> bool {
        *self.running.read()
    }

    fn emit(&self, event: ServiceEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn subscribe_all(&self) {
        let mut active = 0;
        for sub in self.subscriptions() {
            let provider = sub.provider();
            match sub.subscribe(self.host.as_ref(), &self.gate) {
                Ok(()) => {
                    active += 1;
                    self.emit(ServiceEvent::Subscribed(provider));
                }
                Err(error) => {
                    warn!(%provider, %error, "Failed to subscribe to provider");
                    self.emit(ServiceEvent::SubscribeFailed { provider, error });
                }
            }
        }

        info!(
            active,
            configured = self.order.len(),
            "Location service started"
        );
    }

    fn unsubscribe_all(&self) {
        for sub in self.subscriptions() {
            let provider = sub.provider();
            match sub.unsubscribe(self.host.as_ref(), &self.gate) {
                Ok(()) => self.emit(ServiceEvent::Unsubscribed(provider)),
                Err(error) => {
                    match &error {
                        SubscriptionError::PermissionDenied { .. } => {
                            // Registration stays with the host; stop forwarding
                            sub.suspend();
                            warn!(%provider, "Permission denied, skipping unsubscribe");
                        }
                        e if e.is_benign() => {
                            debug!(%provider, "Provider was not subscribed");
                        }
                        e => warn!(%provider, error = %e, "Failed to unsubscribe from provider"),
                    }
                    self.emit(ServiceEvent::UnsubscribeSkipped { provider, error });
                }
            }
        }
    }

    /// Re-evaluate the gate for subscriptions of a running service.
    fn reevaluate_gate(&self) {
        let allowed = self.gate.evaluate();
        debug!(allowed, "Re-evaluating permission gate");

        for sub in self.subscriptions() {
            let provider = sub.provider();
            match (allowed, sub.state()) {
                (false, SubscriptionState::Active) => {
                    if sub.suspend() {
                        warn!(%provider, "Location permission lost, suspending provider");
                        self.emit(ServiceEvent::Suspended(provider));
                    }
                }
                (true, SubscriptionState::Suspended) => {
                    if sub.subscribe(self.host.as_ref(), &self.gate).is_ok() {
                        info!(%provider, "Location permission restored, resuming provider");
                        self.emit(ServiceEvent::Resumed(provider));
                    }
                }
                _ => {}
            }
        }
    }
}

impl FixSink for ServiceCore {
    fn on_fix_received(&self, fix: Fix) {
        let running = self.running.read();
        if !*running {
            trace!(provider = %fix.provider, "Dropping fix, service stopped");
            return;
        }

        let Some(sub) = self.subscriptions.get(&fix.provider) else {
            trace!(provider = %fix.provider, "Dropping fix from unconfigured provider");
            return;
        };
        if !sub.is_active() {
            trace!(provider = %fix.provider, "Dropping fix, subscription not active");
            return;
        }

        sub.record(fix, |fix| {
            // Lagging observers lose fixes; this never blocks
            let _ = self.fixes.send(*fix);
        });
    }
}

// =============================================================================
// Location service
// =============================================================================

/// Aggregates fixes from every configured provider into one stream.
///
/// Cheap to query from any thread. `start()` and `stop()` are idempotent and
/// may be called any number of times in any order.
pub struct LocationService {
    core: Arc<ServiceCore>,
}

impl LocationService {
    /// Create a stopped service.
    ///
    /// Duplicate provider entries in `config` collapse to one subscription.
    /// The event capacity is clamped to `1..=MAX_EVENT_CAPACITY`.
    pub fn new(config: ServiceConfig, host: Arc<dyn ProviderHost>, gate: PermissionGate) -> Self {
        let settings = config.deduplicated();
        let capacity = config.event_capacity.clamp(1, MAX_EVENT_CAPACITY);
        let (fixes, _) = broadcast::channel(capacity);
        let (events, _) = broadcast::channel(capacity);

        let core = Arc::new_cyclic(|weak: &Weak<ServiceCore>| {
            let sink: Weak<dyn FixSink> = weak.clone();
            let subscriptions = settings
                .iter()
                .map(|s| {
                    (
                        s.provider,
                        ProviderSubscription::new(s.provider, s.request(), sink.clone()),
                    )
                })
                .collect();

            ServiceCore {
                host,
                gate,
                subscriptions,
                order: settings.iter().map(|s| s.provider).collect(),
                running: RwLock::new(false),
                lifecycle: Mutex::new(()),
                fixes,
                events,
            }
        });

        Self { core }
    }

    /// Begin location acquisition.
    ///
    /// On a stopped service, marks it running and attempts to subscribe every
    /// configured provider; one failure does not prevent the others. On a
    /// running service, only re-evaluates the permission gate.
    pub fn start(&self) {
        let _lifecycle = self.core.lifecycle.lock();

        if self.core.is_running() {
            self.core.reevaluate_gate();
            return;
        }

        self.start_stopped();
    }

    /// Start the service only if it is stopped.
    ///
    /// Returns true if this call started it. A running service is left
    /// untouched; its permission gate is not re-evaluated.
    pub fn start_if_not_running(&self) -> bool {
        let _lifecycle = self.core.lifecycle.lock();

        if self.core.is_running() {
            return false;
        }
        self.start_stopped();
        true
    }

    /// Caller holds the lifecycle lock.
    fn start_stopped(&self) {
        *self.core.running.write() = true;
        info!(providers = ?self.core.order, "Starting location service");
        self.core.emit(ServiceEvent::Started);
        self.core.subscribe_all();
    }

    /// Cease all location acquisition.
    ///
    /// Attempts to unsubscribe every configured provider regardless of its
    /// state, then marks the service stopped. No fix is forwarded after this
    /// returns.
    pub fn stop(&self) {
        let _lifecycle = self.core.lifecycle.lock();

        self.core.unsubscribe_all();

        let was_running = std::mem::replace(&mut *self.core.running.write(), false);
        if was_running {
            info!("Location service stopped");
            self.core.emit(ServiceEvent::Stopped);
        }
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Whether the provider's subscription is currently forwarding fixes.
    pub fn is_active(&self, provider: ProviderId) -> bool {
        self.core
            .subscriptions
            .get(&provider)
            .is_some_and(|s| s.is_active())
    }

    /// Configured providers, in configuration order.
    pub fn providers(&self) -> &[ProviderId] {
        &self.core.order
    }

    /// Providers currently forwarding fixes, in configuration order.
    pub fn active_providers(&self) -> Vec<ProviderId> {
        self.core
            .subscriptions()
            .filter(|s| s.is_active())
            .map(|s| s.provider())
            .collect()
    }

    /// Last fix received from a provider, if any.
    pub fn last_fix(&self, provider: ProviderId) -> Option<Fix> {
        self.core.subscriptions.get(&provider)?.last_fix()
    }

    /// Most recent fix across all providers, by timestamp.
    pub fn last_known_fix(&self) -> Option<Fix> {
        self.core
            .subscriptions()
            .filter_map(|s| s.last_fix())
            .max_by_key(|f| f.timestamp_ms)
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            running: self.is_running(),
            subscriptions: self.core.subscriptions().map(|s| s.status()).collect(),
        }
    }

    /// Observe forwarded fixes.
    ///
    /// Receivers that fall behind the channel capacity lose the oldest fixes
    /// and see `RecvError::Lagged`.
    pub fn subscribe_fixes(&self) -> broadcast::Receiver<Fix> {
        self.core.fixes.subscribe()
    }

    /// Observe lifecycle diagnostics.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.core.events.subscribe()
    }
}

impl Drop for LocationService {
    fn drop(&mut self) {
        if self.is_running() {
            debug!("Location service dropped while running, stopping");
            self.stop();
        }
    }
}

impl std::fmt::Debug for LocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationService")
            .field("running", &self.is_running())
            .field("providers", &self.core.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use crate::fix::RawPosition;
    use crate::host::SimulatedHost;
    use crate::permission::{GrantTable, PermissionScope};

    fn raw(lat: f64, lon: f64, ts: i64) -> RawPosition {
        RawPosition {
            latitude: lat,
            longitude: lon,
            accuracy_m: 5.0,
            timestamp_ms: ts,
        }
    }

    fn create_service() -> (LocationService, Arc<SimulatedHost>, Arc<GrantTable>) {
        let host = Arc::new(SimulatedHost::with_defaults());
        let grants = Arc::new(GrantTable::granted());
        let service = LocationService::new(
            ServiceConfig::default(),
            host.clone(),
            PermissionGate::new(grants.clone()),
        );
        (service, host, grants)
    }

    fn drain(rx: &mut broadcast::Receiver<ServiceEvent>) -> Vec<ServiceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_new_service_is_stopped() {
        let (service, host, _) = create_service();

        assert!(!service.is_running());
        assert!(service.active_providers().is_empty());
        assert!(host.registered_providers().is_empty());
        assert_eq!(
            service.providers(),
            &[ProviderId::Satellite, ProviderId::Network]
        );
    }

    #[test]
    fn test_start_subscribes_all_providers() {
        let (service, host, _) = create_service();

        service.start();

        assert!(service.is_running());
        assert_eq!(
            service.active_providers(),
            vec![ProviderId::Satellite, ProviderId::Network]
        );
        assert_eq!(
            host.registered_providers(),
            vec![ProviderId::Satellite, ProviderId::Network]
        );
    }

    #[test]
    fn test_start_twice_is_idempotent() {
        let (service, host, _) = create_service();

        service.start();
        service.start();

        assert_eq!(host.request_count(ProviderId::Satellite), 1);
        assert_eq!(host.request_count(ProviderId::Network), 1);
    }

    #[test]
    fn test_start_isolates_provider_failure() {
        let host = Arc::new(SimulatedHost::with_providers(&[ProviderId::Network]));
        let service = LocationService::new(
            ServiceConfig::default(),
            host.clone(),
            PermissionGate::unrestricted(),
        );
        let mut events = service.subscribe_events();

        service.start();

        assert!(service.is_running());
        assert_eq!(service.active_providers(), vec![ProviderId::Network]);
        assert!(drain(&mut events).contains(&ServiceEvent::SubscribeFailed {
            provider: ProviderId::Satellite,
            error: SubscriptionError::ProviderUnavailable {
                provider: ProviderId::Satellite
            },
        }));
    }

    #[test]
    fn test_invalid_parameters_do_not_fail_start() {
        let host = Arc::new(SimulatedHost::with_defaults());
        let config = ServiceConfig::default()
            .with_provider(ProviderSettings::new(ProviderId::Satellite).with_min_distance_m(-1.0));
        let service = LocationService::new(config, host.clone(), PermissionGate::unrestricted());

        service.start();

        assert!(service.is_running());
        assert!(!service.is_active(ProviderId::Satellite));
        assert!(service.is_active(ProviderId::Network));
    }

    #[test]
    fn test_stop_unsubscribes_and_clears_running() {
        let (service, host, _) = create_service();
        service.start();

        service.stop();

        assert!(!service.is_running());
        assert!(service.active_providers().is_empty());
        assert!(host.registered_providers().is_empty());
    }

    #[test]
    fn test_stop_attempts_every_provider_once() {
        let (service, _, _) = create_service();
        let mut events = service.subscribe_events();

        // Never started: every attempt is a benign skip
        service.stop();

        let events = drain(&mut events);
        for provider in [ProviderId::Satellite, ProviderId::Network] {
            let attempts = events
                .iter()
                .filter(|e| match e {
                    ServiceEvent::Unsubscribed(p) => *p == provider,
                    ServiceEvent::UnsubscribeSkipped { provider: p, .. } => *p == provider,
                    _ => false,
                })
                .count();
            assert_eq!(attempts, 1, "{} should be attempted once", provider);
        }
        assert!(!events.contains(&ServiceEvent::Stopped));
    }

    #[test]
    fn test_stop_with_permission_revoked_skips_host() {
        let (service, host, grants) = create_service();
        service.start();

        grants.revoke(PermissionScope::Fine);
        service.stop();

        assert!(!service.is_running());
        assert!(service.active_providers().is_empty());
        assert_eq!(host.remove_count(ProviderId::Satellite), 0);
        assert_eq!(host.remove_count(ProviderId::Network), 0);
    }

    #[test]
    fn test_registration_left_by_denied_stop_is_cleaned_later() {
        let (service, host, grants) = create_service();
        service.start();
        grants.revoke_all();
        service.stop();
        assert_eq!(host.registered_providers().len(), 2);

        grants.grant_all();
        service.stop();

        assert!(host.registered_providers().is_empty());
    }

    #[test]
    fn test_stop_swallows_host_errors() {
        let (service, host, _) = create_service();
        service.start();
        host.set_available(ProviderId::Network, false);

        service.stop();

        assert!(!service.is_running());
        assert!(!service.is_active(ProviderId::Network));
    }

    #[test]
    fn test_fix_is_forwarded_and_cached() {
        let (service, host, _) = create_service();
        let mut fixes = service.subscribe_fixes();
        service.start();

        host.emit(ProviderId::Satellite, raw(1.0, 2.0, 100));

        let expected = Fix::from_raw(ProviderId::Satellite, raw(1.0, 2.0, 100));
        assert_eq!(fixes.try_recv().unwrap(), expected);
        assert_eq!(service.last_fix(ProviderId::Satellite), Some(expected));
        assert_eq!(service.last_fix(ProviderId::Network), None);
    }

    #[test]
    fn test_fix_after_stop_is_dropped() {
        let (service, host, grants) = create_service();
        let mut fixes = service.subscribe_fixes();
        service.start();

        // Registration survives because the host cannot be told to remove it
        grants.revoke_all();
        service.stop();
        assert!(host.emit(ProviderId::Satellite, raw(1.0, 2.0, 100)));

        assert!(fixes.try_recv().is_err());
        assert_eq!(service.last_fix(ProviderId::Satellite), None);
    }

    #[test]
    fn test_restart_reevaluates_gate() {
        let (service, host, grants) = create_service();
        let mut fixes = service.subscribe_fixes();
        let mut events = service.subscribe_events();
        service.start();

        grants.revoke(PermissionScope::Coarse);
        service.start();
        assert!(service.is_running());
        assert!(service.active_providers().is_empty());

        host.emit(ProviderId::Network, raw(3.0, 4.0, 200));
        assert!(fixes.try_recv().is_err());

        grants.grant_all();
        service.start();
        assert_eq!(service.active_providers().len(), 2);
        assert_eq!(host.request_count(ProviderId::Network), 1);

        let events = drain(&mut events);
        assert!(events.contains(&ServiceEvent::Suspended(ProviderId::Network)));
        assert!(events.contains(&ServiceEvent::Resumed(ProviderId::Network)));
    }

    #[test]
    fn test_last_known_fix_is_most_recent() {
        let (service, host, _) = create_service();
        service.start();

        host.emit(ProviderId::Network, raw(3.0, 4.0, 300));
        host.emit(ProviderId::Satellite, raw(1.0, 2.0, 100));

        let last = service.last_known_fix().unwrap();
        assert_eq!(last.provider, ProviderId::Network);
        assert_eq!(last.timestamp_ms, 300);
    }

    #[test]
    fn test_last_fix_survives_stop() {
        let (service, host, _) = create_service();
        service.start();
        host.emit(ProviderId::Satellite, raw(1.0, 2.0, 100));
        service.stop();

        assert!(service.last_fix(ProviderId::Satellite).is_some());
    }

    #[test]
    fn test_status_snapshot() {
        let (service, _, _) = create_service();
        service.start();

        let status = service.status();
        assert!(status.running);
        assert_eq!(status.subscriptions.len(), 2);
        assert_eq!(status.active_count(), 2);
    }

    #[test]
    fn test_duplicate_providers_collapse() {
        let host = Arc::new(SimulatedHost::with_defaults());
        let mut config = ServiceConfig::empty();
        config.providers = vec![
            ProviderSettings::new(ProviderId::Satellite),
            ProviderSettings::new(ProviderId::Satellite).with_interval_ms(1000),
        ];
        let service = LocationService::new(config, host.clone(), PermissionGate::unrestricted());

        service.start();

        assert_eq!(service.providers(), &[ProviderId::Satellite]);
        assert_eq!(host.request_count(ProviderId::Satellite), 1);
    }

    #[test]
    fn test_start_if_not_running_starts_once() {
        let (service, host, _) = create_service();

        assert!(service.start_if_not_running());
        assert!(!service.start_if_not_running());

        assert!(service.is_running());
        assert_eq!(host.request_count(ProviderId::Satellite), 1);
        assert_eq!(host.request_count(ProviderId::Network), 1);
    }

    #[test]
    fn test_start_if_not_running_skips_gate_reevaluation() {
        let (service, _host, grants) = create_service();
        service.start();
        let mut events = service.subscribe_events();

        grants.revoke(PermissionScope::Fine);
        assert!(!service.start_if_not_running());

        assert_eq!(service.active_providers().len(), 2);
        assert!(drain(&mut events).is_empty());
    }

    #[test]
    fn test_start_if_not_running_after_stop() {
        let (service, _host, _) = create_service();
        service.start();
        service.stop();

        assert!(service.start_if_not_running());
        assert_eq!(service.active_providers().len(), 2);
    }

    #[test]
    fn test_oversized_event_capacity_is_clamped() {
        let host = Arc::new(SimulatedHost::with_defaults());
        let config = ServiceConfig::default().with_event_capacity(usize::MAX);
        let service = LocationService::new(config, host.clone(), PermissionGate::unrestricted());
        let mut fixes = service.subscribe_fixes();
        service.start();

        host.emit(ProviderId::Satellite, raw(1.0, 2.0, 100));

        assert_eq!(fixes.try_recv().unwrap().timestamp_ms, 100);
    }

    #[test]
    fn test_zero_event_capacity_keeps_one_slot() {
        let host = Arc::new(SimulatedHost::with_defaults());
        let config = ServiceConfig::default().with_event_capacity(0);
        let service = LocationService::new(config, host.clone(), PermissionGate::unrestricted());
        let mut fixes = service.subscribe_fixes();
        service.start();

        host.emit(ProviderId::Satellite, raw(1.0, 2.0, 100));
        host.emit(ProviderId::Satellite, raw(1.0, 2.0, 200));

        assert!(matches!(
            fixes.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
        assert_eq!(fixes.try_recv().unwrap().timestamp_ms, 200);
    }

    #[test]
    fn test_drop_while_running_unregisters() {
        let (service, host, _) = create_service();
        service.start();

        drop(service);

        assert!(host.registered_providers().is_empty());
    }
}
