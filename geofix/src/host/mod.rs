//! Provider host abstraction.
//!
//! The host is the external sensor subsystem: it knows which providers exist,
//! accepts update registrations, and calls back into a [`ProviderListener`]
//! as positions arrive. The service only ever talks to it through
//! [`ProviderHost`], so real platform bindings and the in-memory
//! [`SimulatedHost`] are interchangeable.
//!
//! # Contract
//!
//! - `request_updates` and `remove_updates` return promptly. They never wait
//!   for a first fix.
//! - Callbacks may arrive on any thread, concurrently with lifecycle calls.
//! - At most one registration per provider is held by a single caller.

mod simulated;

use std::sync::Arc;
use std::time::Duration;

use crate::error::SubscriptionError;
use crate::fix::{ProviderId, ProviderStatus, RawPosition};

pub use simulated::{SimulatedHost, SimulatedHostConfig};

/// Parameters of an update registration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateRequest {
    /// Minimum time between callbacks.
    pub interval: Duration,
    /// Minimum movement between callbacks. Zero delivers on every interval.
    pub min_distance_m: f32,
}

impl UpdateRequest {
    pub fn new(interval: Duration, min_distance_m: f32) -> Self {
        Self {
            interval,
            min_distance_m,
        }
    }

    /// Reject malformed parameters before they reach the host.
    pub fn validate(&self, provider: ProviderId) -> Result<(), SubscriptionError> {
        if self.interval.is_zero() {
            return Err(SubscriptionError::InvalidParameters {
                provider,
                reason: "interval must be greater than zero".to_string(),
            });
        }
        if !self.min_distance_m.is_finite() || self.min_distance_m < 0.0 {
            return Err(SubscriptionError::InvalidParameters {
                provider,
                reason: format!(
                    "minimum distance must be a non-negative number of meters, got {}",
                    self.min_distance_m
                ),
            });
        }
        Ok(())
    }
}

/// Callbacks delivered by the host for one registration.
///
/// Only `on_position` is required; the other notifications default to no-ops.
pub trait ProviderListener: Send + Sync {
    /// A new position is available.
    fn on_position(&self, position: RawPosition);

    /// The provider was enabled by the user or system.
    fn on_provider_enabled(&self) {}

    /// The provider was disabled by the user or system.
    fn on_provider_disabled(&self) {}

    /// The provider's availability status changed.
    fn on_status_changed(&self, _status: ProviderStatus) {}
}

/// The external location capability.
pub trait ProviderHost: Send + Sync {
    /// Whether the named provider exists on this host.
    fn has_provider(&self, provider: ProviderId) -> bool;

    /// Start delivering callbacks for `provider` to `listener`.
    ///
    /// Replaces any existing registration for the same provider.
    fn request_updates(
        &self,
        provider: ProviderId,
        request: &UpdateRequest,
        listener: Arc<dyn ProviderListener>,
    ) -> Result<(), SubscriptionError>;

    /// Stop delivering callbacks for `provider`.
    fn remove_updates(&self, provider: ProviderId) -> Result<(), SubscriptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        let request = UpdateRequest::new(Duration::from_millis(5000), 0.0);
        assert!(request.validate(ProviderId::Satellite).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let request = UpdateRequest::new(Duration::ZERO, 0.0);
        let err = request.validate(ProviderId::Network).unwrap_err();
        assert!(matches!(
            err,
            SubscriptionError::InvalidParameters {
                provider: ProviderId::Network,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_negative_or_nan_distance() {
        let provider = ProviderId::Satellite;
        for distance in [-1.0, f32::NAN, f32::INFINITY] {
            let request = UpdateRequest::new(Duration::from_secs(1), distance);
            assert!(
                request.validate(provider).is_err(),
                "distance {} should be rejected",
                distance
            );
        }
    }
}
