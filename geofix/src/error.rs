//! Subscription error types.
//!
//! Every per-provider operation reports one of four error kinds. None of them
//! escape the service lifecycle: `start()` and `stop()` log them and emit a
//! [`crate::service::ServiceEvent`] instead.

use thiserror::Error;

use crate::fix::ProviderId;

/// Errors that can occur while subscribing to or unsubscribing from a provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubscriptionError {
    /// The permission gate evaluated false for the provider's scope.
    #[error("Location permission denied for provider {provider}")]
    PermissionDenied { provider: ProviderId },

    /// The named provider does not exist on the host.
    #[error("Provider {provider} is not available on this host")]
    ProviderUnavailable { provider: ProviderId },

    /// Polling interval or distance threshold is malformed.
    #[error("Invalid update parameters for provider {provider}: {reason}")]
    InvalidParameters {
        provider: ProviderId,
        reason: String,
    },

    /// Unsubscribe was requested while the subscription was not active.
    #[error("Subscription to provider {provider} is not active")]
    NotActive { provider: ProviderId },
}

impl SubscriptionError {
    /// The provider this error refers to.
    pub fn provider(&self) -> ProviderId {
        match self {
            SubscriptionError::PermissionDenied { provider }
            | SubscriptionError::ProviderUnavailable { provider }
            | SubscriptionError::InvalidParameters { provider, .. }
            | SubscriptionError::NotActive { provider } => *provider,
        }
    }

    /// Returns true for outcomes the caller can treat as a no-op.
    pub fn is_benign(&self) -> bool {
        matches!(self, SubscriptionError::NotActive { .. })
    }
}
