//! Serialization of `ConfigFile` → INI text.

use super::file::ConfigFile;
use super::settings::ProviderSettings;

/// Render the configuration as commented INI text.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let providers = config
        .service
        .providers
        .iter()
        .map(|s| s.provider.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let provider_sections: String = config
        .service
        .providers
        .iter()
        .map(provider_section)
        .collect();

    format!(
        r#"# Geofix configuration

[service]
# Providers to subscribe to: satellite, network, passive
providers = {}
# Fixes buffered per observer before the oldest are dropped (1-65536)
event_capacity = {}
{}
[logging]
directory = {}
file = {}
"#,
        providers,
        config.service.event_capacity,
        provider_sections,
        config.logging.directory.display(),
        config.logging.file,
    )
}

fn provider_section(settings: &ProviderSettings) -> String {
    format!(
        r#"
[provider.{}]
interval_ms = {}
# 0 delivers on every interval regardless of movement
min_distance_m = {}
"#,
        settings.provider, settings.interval_ms, settings.min_distance_m
    )
}
