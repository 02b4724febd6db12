//! Configuration for the location service.
//!
//! - [`ServiceConfig`] / [`ProviderSettings`]: the in-memory configuration
//!   fixed at service construction.
//! - [`ConfigFile`]: the on-disk `~/.geofix/config.ini`, parsed in
//!   [`parser`] and serialized in [`writer`].
//!
//! # Example
//!
//! ```
//! use geofix::config::{ProviderSettings, ServiceConfig};
//! use geofix::ProviderId;
//!
//! let config = ServiceConfig::default()
//!     .with_provider(ProviderSettings::new(ProviderId::Passive).with_interval_ms(30_000));
//!
//! assert_eq!(config.providers.len(), 3);
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError, LoggingSettings};
pub use settings::{
    ProviderSettings, ServiceConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_INTERVAL_MS,
    DEFAULT_MIN_DISTANCE_M, DEFAULT_PROVIDERS, MAX_EVENT_CAPACITY,
};
