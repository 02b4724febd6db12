//! Config command - print the effective configuration.

use std::path::PathBuf;

use crate::error::CliError;

use super::common::load_config;

/// Run the config command.
pub fn run(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let (path, config) = load_config(config_path.as_deref())?;

    if path.exists() {
        println!("# Loaded from {}", path.display());
    } else {
        println!("# {} not found, showing defaults", path.display());
    }
    print!("{}", config.to_ini_string());
    Ok(())
}
