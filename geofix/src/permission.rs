//! Permission gate for location access.
//!
//! Location access requires both a coarse-grained and a fine-grained
//! authorization from the host's access-control system. On platforms
//! without runtime-revocable permissions the gate always passes.
//!
//! The gate is evaluated on every subscribe and unsubscribe call. Nothing is
//! cached, since the user can revoke access at any time while the service
//! runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SubscriptionError;
use crate::fix::ProviderId;

/// A location authorization scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionScope {
    /// Approximate location (network-level precision).
    Coarse,
    /// Precise location (satellite-level precision).
    Fine,
}

/// Host access-control system.
pub trait AccessControl: Send + Sync {
    /// Whether the given scope is currently granted.
    fn is_granted(&self, scope: PermissionScope) -> bool;

    /// Whether permissions on this platform can be revoked at runtime.
    ///
    /// When false, the gate always evaluates true.
    fn runtime_revocable(&self) -> bool {
        true
    }
}

/// Combined coarse + fine permission check.
#[derive(Clone)]
pub struct PermissionGate {
    access: Arc<dyn AccessControl>,
}

impl PermissionGate {
    /// Create a gate backed by the given access-control system.
    pub fn new(access: Arc<dyn AccessControl>) -> Self {
        Self { access }
    }

    /// Gate for platforms with no runtime permissions.
    pub fn unrestricted() -> Self {
        Self::new(Arc::new(Unrestricted))
    }

    /// Evaluate the gate against the current host state.
    pub fn evaluate(&self) -> bool {
        if !self.access.runtime_revocable() {
            return true;
        }

        self.access.is_granted(PermissionScope::Coarse)
            && self.access.is_granted(PermissionScope::Fine)
    }

    /// Evaluate the gate for an operation on `provider`.
    pub fn check(&self, provider: ProviderId) -> Result<(), SubscriptionError> {
        if self.evaluate() {
            Ok(())
        } else {
            Err(SubscriptionError::PermissionDenied { provider })
        }
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("runtime_revocable", &self.access.runtime_revocable())
            .finish()
    }
}

/// Access control for platforms without runtime-revocable permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl AccessControl for Unrestricted {
    fn is_granted(&self, _scope: PermissionScope) -> bool {
        true
    }

    fn runtime_revocable(&self) -> bool {
        false
    }
}

/// Mutable grant state, shared between a driver and the gate.
///
/// Lets a driver (or a test) grant and revoke scopes while the service is
/// running.
#[derive(Debug, Default)]
pub struct GrantTable {
    coarse: AtomicBool,
    fine: AtomicBool,
}

impl GrantTable {
    /// Table with nothing granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with both scopes granted.
    pub fn granted() -> Self {
        let table = Self::new();
        table.grant_all();
        table
    }

    fn flag(&self, scope: PermissionScope) -> &AtomicBool {
        match scope {
            PermissionScope::Coarse => &self.coarse,
            PermissionScope::Fine => &self.fine,
        }
    }

    pub fn grant(&self, scope: PermissionScope) {
        self.flag(scope).store(true, Ordering::SeqCst);
    }

    pub fn revoke(&self, scope: PermissionScope) {
        self.flag(scope).store(false, Ordering::SeqCst);
    }

    pub fn grant_all(&self) {
        self.grant(PermissionScope::Coarse);
        self.grant(PermissionScope::Fine);
    }

    pub fn revoke_all(&self) {
        self.revoke(PermissionScope::Coarse);
        self.revoke(PermissionScope::Fine);
    }
}

impl AccessControl for GrantTable {
    fn is_granted(&self, scope: PermissionScope) -> bool {
        self.flag(scope).load(Ordering::SeqCst)
    }
}
