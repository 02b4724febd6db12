//! Common utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use geofix::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Resolve the config path: CLI argument, then the default location.
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    cli_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path)
}

/// Load the configuration, falling back to defaults when the file is missing.
pub fn load_config(cli_path: Option<&Path>) -> Result<(PathBuf, ConfigFile), CliError> {
    let path = resolve_config_path(cli_path);
    let config = ConfigFile::load_from(&path)?;
    Ok((path, config))
}
