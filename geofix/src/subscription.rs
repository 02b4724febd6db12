//! Provider subscriptions.
//!
//! A [`ProviderSubscription`] represents one registration with a single named
//! provider. It owns its last-known-fix cache and hands the host a
//! [`SubscriptionListener`] that turns raw callbacks into [`Fix`] values for
//! the owning service.
//!
//! # States
//!
//! ```text
//!            subscribe()                 gate denied while running
//! Inactive ─────────────► Active ──────────────────────────────► Suspended
//!    ▲                      │  ▲            gate granted again        │
//!    │     unsubscribe()    │  └──────────────────────────────────────┤
//!    └──────────────────────┴─────────────────────────────────────────┘
//! ```
//!
//! `Suspended` keeps the host registration but stops forwarding, so a later
//! `unsubscribe()` still cleans it up.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::SubscriptionError;
use crate::fix::{Fix, ProviderId, ProviderStatus, RawPosition};
use crate::host::{ProviderHost, ProviderListener, UpdateRequest};
use crate::permission::PermissionGate;

/// Receiver of fixes produced by subscription callbacks.
pub trait FixSink: Send + Sync {
    /// Handle a fix delivered by a provider callback.
    fn on_fix_received(&self, fix: Fix);
}

/// Registration state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Not registered with the host.
    Inactive,
    /// Registered and forwarding fixes.
    Active,
    /// Registered, but forwarding paused after permission loss.
    Suspended,
}

impl SubscriptionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SubscriptionState::Active,
            2 => SubscriptionState::Suspended,
            _ => SubscriptionState::Inactive,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SubscriptionState::Inactive => 0,
            SubscriptionState::Active => 1,
            SubscriptionState::Suspended => 2,
        }
    }
}

/// Point-in-time view of one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionStatus {
    pub provider: ProviderId,
    pub state: SubscriptionState,
    pub request: UpdateRequest,
    pub last_fix: Option<Fix>,
}

/// One subscription to a single named provider.
pub struct ProviderSubscription {
    provider: ProviderId,
    request: UpdateRequest,
    state: AtomicU8,
    last_fix: RwLock<Option<Fix>>,
    listener: Arc<SubscriptionListener>,
}

impl ProviderSubscription {
    /// Create an inactive subscription whose callbacks feed `sink`.
    pub fn new(provider: ProviderId, request: UpdateRequest, sink: Weak<dyn FixSink>) -> Self {
        Self {
            provider,
            request,
            state: AtomicU8::new(SubscriptionState::Inactive.as_u8()),
            last_fix: RwLock::new(None),
            listener: Arc::new(SubscriptionListener { provider, sink }),
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn request(&self) -> UpdateRequest {
        self.request
    }

    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SubscriptionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// True only while registered and forwarding.
    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Last fix received, kept across stop/start.
    pub fn last_fix(&self) -> Option<Fix> {
        *self.last_fix.read()
    }

    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus {
            provider: self.provider,
            state: self.state(),
            request: self.request,
            last_fix: self.last_fix(),
        }
    }

    /// Ask the host to start delivering fixes for this provider.
    ///
    /// Already active is a no-op. A suspended subscription is resumed
    /// without a second host registration.
    pub fn subscribe(
        &self,
        host: &dyn ProviderHost,
        gate: &PermissionGate,
    ) -> Result<(), SubscriptionError> {
        gate.check(self.provider)?;

        match self.state() {
            SubscriptionState::Active => return Ok(()),
            SubscriptionState::Suspended => {
                self.set_state(SubscriptionState::Active);
                return Ok(());
            }
            SubscriptionState::Inactive => {}
        }

        self.request.validate(self.provider)?;
        if !host.has_provider(self.provider) {
            return Err(SubscriptionError::ProviderUnavailable {
                provider: self.provider,
            });
        }

        let listener: Arc<dyn ProviderListener> = self.listener.clone();
        host.request_updates(self.provider, &self.request, listener)?;
        self.set_state(SubscriptionState::Active);

        info!(
            provider = %self.provider,
            interval_ms = self.request.interval.as_millis() as u64,
            min_distance_m = self.request.min_distance_m,
            "Subscribed to provider"
        );
        Ok(())
    }

    /// Ask the host to stop delivering fixes for this provider.
    ///
    /// The gate is checked first: without authorization the host is not
    /// contacted at all. Once the host has been asked, the subscription is
    /// inactive even if the host reported an error.
    pub fn unsubscribe(
        &self,
        host: &dyn ProviderHost,
        gate: &PermissionGate,
    ) -> Result<(), SubscriptionError> {
        gate.check(self.provider)?;

        if self.state() == SubscriptionState::Inactive {
            return Err(SubscriptionError::NotActive {
                provider: self.provider,
            });
        }

        let result = host.remove_updates(self.provider);
        self.set_state(SubscriptionState::Inactive);

        if result.is_ok() {
            info!(provider = %self.provider, "Unsubscribed from provider");
        }
        result
    }

    /// Pause forwarding after permission loss. Returns true if it was active.
    pub fn suspend(&self) -> bool {
        self.state
            .compare_exchange(
                SubscriptionState::Active.as_u8(),
                SubscriptionState::Suspended.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Update the cache and forward the fix while holding the cache lock.
    ///
    /// Readers of [`last_fix`](Self::last_fix) never observe a cached fix
    /// that has not been forwarded yet.
    pub(crate) fn record<F>(&self, fix: Fix, forward: F)
    where
        F: FnOnce(&Fix),
    {
        let mut last = self.last_fix.write();
        *last = Some(fix);
        forward(&fix);
    }
}

impl std::fmt::Debug for ProviderSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSubscription")
            .field("provider", &self.provider)
            .field("state", &self.state())
            .field("request", &self.request)
            .finish()
    }
}

/// Callback adapter registered with the host.
///
/// Holds only a weak reference to its service, so a registration leaked by
/// the host cannot keep a dropped service alive.
pub struct SubscriptionListener {
    provider: ProviderId,
    sink: Weak<dyn FixSink>,
}

impl ProviderListener for SubscriptionListener {
    fn on_position(&self, position: RawPosition) {
        match self.sink.upgrade() {
            Some(sink) => sink.on_fix_received(Fix::from_raw(self.provider, position)),
            None => debug!(provider = %self.provider, "Fix arrived after service was dropped"),
        }
    }

    fn on_provider_enabled(&self) {
        debug!(provider = %self.provider, "Provider enabled");
    }

    fn on_provider_disabled(&self) {
        debug!(provider = %self.provider, "Provider disabled");
    }

    fn on_status_changed(&self, status: ProviderStatus) {
        debug!(provider = %self.provider, ?status, "Provider status changed");
    }
}
