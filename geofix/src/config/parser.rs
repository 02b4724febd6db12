//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};
use super::settings::{ProviderSettings, MAX_EVENT_CAPACITY};
use crate::fix::ProviderId;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [service] section
    if let Some(section) = ini.section(Some("service")) {
        if let Some(v) = section.get("providers") {
            config.service.providers = parse_provider_list(v)?
                .into_iter()
                .map(ProviderSettings::new)
                .collect();
        }
        if let Some(v) = section.get("event_capacity") {
            config.service.event_capacity = match v.trim().parse::<usize>() {
                Ok(n) if (1..=MAX_EVENT_CAPACITY).contains(&n) => n,
                _ => {
                    return Err(invalid(
                        "service",
                        "event_capacity",
                        v,
                        &format!("must be an integer between 1 and {}", MAX_EVENT_CAPACITY),
                    ))
                }
            };
        }
    }

    // [provider.<name>] sections
    for settings in config.service.providers.iter_mut() {
        let section_name = format!("provider.{}", settings.provider);
        if let Some(section) = ini.section(Some(section_name.as_str())) {
            apply_provider_section(&section_name, section, settings)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn parse_provider_list(value: &str) -> Result<Vec<ProviderId>, ConfigFileError> {
    let mut providers: Vec<ProviderId> = Vec::new();
    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let provider = name
            .parse::<ProviderId>()
            .map_err(|e| invalid("service", "providers", value, &e.to_string()))?;
        if !providers.contains(&provider) {
            providers.push(provider);
        }
    }
    Ok(providers)
}

fn apply_provider_section(
    section_name: &str,
    section: &Properties,
    settings: &mut ProviderSettings,
) -> Result<(), ConfigFileError> {
    if let Some(v) = section.get("interval_ms") {
        settings.interval_ms = match v.trim().parse::<u64>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(invalid(
                    section_name,
                    "interval_ms",
                    v,
                    "must be a positive number of milliseconds",
                ))
            }
        };
    }
    if let Some(v) = section.get("min_distance_m") {
        settings.min_distance_m = match v.trim().parse::<f32>() {
            Ok(d) if d.is_finite() && d >= 0.0 => d,
            _ => {
                return Err(invalid(
                    section_name,
                    "min_distance_m",
                    v,
                    "must be a non-negative number of meters",
                ))
            }
        };
    }
    Ok(())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        ConfigFile::from_ini_str(content)
    }

    #[test]
    fn test_empty_ini_yields_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_provider_list_and_overrides() {
        let config = parse(
            "[service]\n\
             providers = network, passive\n\
             event_capacity = 8\n\
             [provider.passive]\n\
             interval_ms = 30000\n\
             min_distance_m = 50\n",
        )
        .unwrap();

        let providers: Vec<_> = config.service.providers.iter().map(|s| s.provider).collect();
        assert_eq!(providers, vec![ProviderId::Network, ProviderId::Passive]);
        assert_eq!(config.service.event_capacity, 8);

        let passive = config.service.provider(ProviderId::Passive).unwrap();
        assert_eq!(passive.interval_ms, 30_000);
        assert_eq!(passive.min_distance_m, 50.0);

        let network = config.service.provider(ProviderId::Network).unwrap();
        assert_eq!(network.interval_ms, 5000);
    }

    #[test]
    fn test_duplicate_providers_collapse() {
        let config = parse("[service]\nproviders = satellite, gps, network\n").unwrap();
        assert_eq!(config.service.providers.len(), 2);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[service]\nproviders = satellite, fused\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigFileError::InvalidValue { ref key, .. } if key == "providers"
        ));
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let err = parse("[provider.satellite]\ninterval_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("provider.satellite.interval_ms"));
    }

    #[test]
    fn test_negative_distance_rejected() {
        let err = parse("[provider.network]\nmin_distance_m = -5\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { .. }));
    }

    #[test]
    fn test_event_capacity_bounds() {
        let at_max = format!("[service]\nevent_capacity = {}\n", MAX_EVENT_CAPACITY);
        assert_eq!(parse(&at_max).unwrap().service.event_capacity, MAX_EVENT_CAPACITY);

        for value in ["0", "65537", "18446744073709551615", "many"] {
            let err = parse(&format!("[service]\nevent_capacity = {}\n", value)).unwrap_err();
            assert!(
                matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "event_capacity"),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_section_for_unlisted_provider_ignored() {
        let config = parse("[provider.passive]\ninterval_ms = 1000\n").unwrap();
        assert!(config.service.provider(ProviderId::Passive).is_none());
    }

    #[test]
    fn test_logging_section() {
        let config = parse("[logging]\ndirectory = /var/log/geofix\nfile = fixes.log\n").unwrap();
        assert_eq!(config.logging.directory, PathBuf::from("/var/log/geofix"));
        assert_eq!(config.logging.file, "fixes.log");
    }
}
