//! Init command - initialize configuration file.

use geofix::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
pub fn run() -> Result<(), CliError> {
    let path = config_file_path();

    if ConfigFile::ensure_exists_at(&path)? {
        println!("Created configuration file:");
    } else {
        println!("Configuration file already exists:");
    }
    println!("  {}", path.display());
    println!();
    println!("Edit this file to choose providers and polling parameters.");
    Ok(())
}
