//! Geofix CLI - driver for the location update service
//!
//! Starts and stops a `LocationService` against a simulated provider host
//! and prints the fixes it forwards.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "geofix")]
#[command(version, about = "Aggregate position fixes from multiple location providers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file (~/.geofix/config.ini)
    Init,

    /// Print the effective configuration
    Config {
        /// Configuration file to read instead of ~/.geofix/config.ini
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the location service against the simulated provider host
    Run {
        /// Configuration file to read instead of ~/.geofix/config.ini
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(long)]
        duration: Option<u64>,

        /// Print fixes as JSON lines
        #[arg(long)]
        json: bool,

        /// Start without the fine location permission granted
        #[arg(long)]
        deny_fine: bool,

        /// Revoke the fine location permission after this many seconds
        #[arg(long)]
        revoke_after: Option<u64>,

        /// Kill the service without stopping it after this many seconds and
        /// start a fresh instance (simulates involuntary termination)
        #[arg(long)]
        restart_after: Option<u64>,

        /// Listen to the passive provider directly and start the service
        /// only when it delivers no fix for this many seconds
        #[arg(long)]
        fallback_timeout: Option<u64>,

        /// Seconds the service runs before switching back to the primary
        /// provider (default: 60)
        #[arg(long, requires = "fallback_timeout")]
        fallback_window: Option<u64>,

        /// Disable the simulated primary provider after this many seconds
        #[arg(long, requires = "fallback_timeout")]
        primary_outage_after: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config { config } => commands::config::run(config),
        Commands::Run {
            config,
            duration,
            json,
            deny_fine,
            revoke_after,
            restart_after,
            fallback_timeout,
            fallback_window,
            primary_outage_after,
        } => commands::run::run(RunArgs {
            config,
            duration,
            json,
            deny_fine,
            revoke_after,
            restart_after,
            fallback_timeout,
            fallback_window,
            primary_outage_after,
        }),
    };

    if let Err(e) = result {
        e.exit();
    }
}
