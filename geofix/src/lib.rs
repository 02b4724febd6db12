//! Geofix - location update service
//!
//! This library aggregates position fixes from multiple independent
//! location providers (satellite, network, ...) into a single update stream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        LocationService                        │
//! │                                                               │
//! │  start()/stop() ──► PermissionGate ──► ProviderSubscription   │
//! │                                         (one per provider)    │
//! │                                              │                │
//! │  ProviderHost ──► SubscriptionListener ──────┘                │
//! │                          │                                    │
//! │                          ▼                                    │
//! │                   on_fix_received ──► broadcast<Fix>          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The service owns one [`subscription::ProviderSubscription`] per configured
//! provider, drives their registration against a [`permission::PermissionGate`],
//! and re-broadcasts every received [`Fix`] unchanged.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geofix::config::ServiceConfig;
//! use geofix::host::SimulatedHost;
//! use geofix::permission::{GrantTable, PermissionGate};
//! use geofix::service::LocationService;
//!
//! let host = Arc::new(SimulatedHost::with_defaults());
//! let gate = PermissionGate::new(Arc::new(GrantTable::granted()));
//! let service = LocationService::new(ServiceConfig::default(), host, gate);
//!
//! let mut fixes = service.subscribe_fixes();
//! service.start();
//! while let Ok(fix) = fixes.recv().await {
//!     println!("{}: {}, {}", fix.provider, fix.latitude, fix.longitude);
//! }
//! service.stop();
//! ```

pub mod config;
pub mod error;
pub mod fix;
pub mod host;
pub mod logging;
pub mod permission;
pub mod service;
pub mod subscription;

pub use error::SubscriptionError;
pub use fix::{Fix, ProviderId, ProviderStatus, RawPosition};
pub use service::{LocationService, ServiceEvent};

/// Library version, taken from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
