//! Run command - drive the location service against the simulated host.
//!
//! This command plays the part of the host process-lifecycle manager: it
//! constructs the service, calls `start()`, prints fixes until told to stop,
//! and calls `stop()` on the way out. It can also simulate permission
//! revocation, a restart after involuntary termination, and a primary feed
//! that hands over to the service when it goes quiet.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use geofix::config::{ConfigFile, ServiceConfig};
use geofix::host::{ProviderHost, SimulatedHost, UpdateRequest};
use geofix::logging::init_logging;
use geofix::permission::{GrantTable, PermissionGate, PermissionScope};
use geofix::{Fix, LocationService, ProviderId};

use super::common::load_config;
use super::fallback::{
    register_primary, FallbackWatchdog, WatchdogAction, DEFAULT_FALLBACK_WINDOW_SECS,
    PRIMARY_PROVIDER,
};
use crate::error::CliError;

/// Arguments for the run command.
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub duration: Option<u64>,
    pub json: bool,
    pub deny_fine: bool,
    pub revoke_after: Option<u64>,
    pub restart_after: Option<u64>,
    pub fallback_timeout: Option<u64>,
    pub fallback_window: Option<u64>,
    pub primary_outage_after: Option<u64>,
}

/// Primary feed polling interval in fallback mode.
const PRIMARY_INTERVAL: Duration = Duration::from_secs(1);

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let (path, config) = load_config(args.config.as_deref())?;
    let _logging = init_logging(&config.logging.directory, &config.logging.file)
        .map_err(CliError::LoggingInit)?;
    info!(config = %path.display(), version = geofix::VERSION, "Geofix starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received shutdown signal, stopping...");
        signal.cancel();
    })
    .map_err(|e| CliError::SignalHandler(e.to_string()))?;

    runtime.block_on(drive(args, config, shutdown));
    Ok(())
}

/// Resolves after `secs` seconds, or never when `secs` is `None`.
fn timer(secs: Option<u64>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    match secs {
        Some(secs) => Box::pin(tokio::time::sleep(Duration::from_secs(secs))),
        None => Box::pin(std::future::pending()),
    }
}

fn print_banner(config: &ServiceConfig) {
    eprintln!("Geofix v{}", geofix::VERSION);
    eprintln!("==========");
    for settings in &config.providers {
        eprintln!(
            "  {:<10} every {} ms, min distance {} m",
            settings.provider.as_str(),
            settings.interval_ms,
            settings.min_distance_m
        );
    }
    eprintln!();
    eprintln!("Press Ctrl+C to stop");
    eprintln!();
}

fn print_fix(fix: &Fix, json: bool) {
    if json {
        match serde_json::to_string(fix) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "Failed to serialize fix"),
        }
    } else {
        println!("{}", fix);
    }
}

async fn drive(args: RunArgs, config: ConfigFile, shutdown: CancellationToken) {
    let mut service_config = config.to_service_config();
    if args.fallback_timeout.is_some() {
        // The primary provider belongs to the driver in this mode
        service_config.providers.retain(|s| s.provider != PRIMARY_PROVIDER);
    }
    print_banner(&service_config);

    let host = Arc::new(SimulatedHost::with_defaults());
    let feed = host.spawn_feed(shutdown.child_token());

    let grants = Arc::new(GrantTable::granted());
    if args.deny_fine {
        grants.revoke(PermissionScope::Fine);
    }
    let gate = PermissionGate::new(grants.clone());

    let mut service = LocationService::new(service_config.clone(), host.clone(), gate.clone());
    let mut fixes = service.subscribe_fixes();

    let (primary_tx, mut primary_rx) = mpsc::unbounded_channel();
    let primary_request = UpdateRequest::new(PRIMARY_INTERVAL, 0.0);
    let mut watchdog = args.fallback_timeout.map(|timeout| {
        let window = args.fallback_window.unwrap_or(DEFAULT_FALLBACK_WINDOW_SECS);
        FallbackWatchdog::new(
            Duration::from_secs(timeout),
            Duration::from_secs(window),
            Instant::now(),
        )
    });

    match watchdog {
        Some(_) => {
            info!(provider = %PRIMARY_PROVIDER, "Fallback mode, listening to primary provider");
            if let Err(e) = register_primary(host.as_ref(), &primary_request, &primary_tx) {
                warn!(error = %e, "Failed to register primary provider");
            }
        }
        None => service.start(),
    }

    let mut deadline = timer(args.duration);
    let mut revoke = timer(args.revoke_after);
    let mut restart = timer(args.restart_after);
    let mut outage = timer(args.primary_outage_after);
    let mut counts: BTreeMap<ProviderId, u64> = BTreeMap::new();

    loop {
        let watchdog_deadline = watchdog
            .as_ref()
            .map(FallbackWatchdog::deadline)
            .unwrap_or_else(Instant::now);

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = &mut deadline => {
                info!("Run duration elapsed");
                break;
            }
            _ = &mut revoke => {
                warn!("Revoking fine location permission");
                grants.revoke(PermissionScope::Fine);
                // Driver re-signals start so the gate is re-evaluated
                if service.is_running() {
                    service.start();
                }
                revoke = timer(None);
            }
            _ = &mut restart => {
                warn!("Simulating service termination and restart");
                let was_running = service.is_running();
                // Killed without stop(): registrations stay with the host
                std::mem::forget(service);
                service = LocationService::new(service_config.clone(), host.clone(), gate.clone());
                fixes = service.subscribe_fixes();
                if was_running {
                    service.start();
                }
                restart = timer(None);
            }
            _ = &mut outage => {
                warn!(provider = %PRIMARY_PROVIDER, "Simulating primary provider outage");
                host.set_enabled(PRIMARY_PROVIDER, false);
                outage = timer(None);
            }
            _ = tokio::time::sleep_until(watchdog_deadline), if watchdog.is_some() => {
                if let Some(watchdog) = watchdog.as_mut() {
                    handle_watchdog(
                        watchdog,
                        &service,
                        host.as_ref(),
                        &primary_request,
                        &primary_tx,
                    );
                }
            }
            Some(fix) = primary_rx.recv() => {
                if let Some(watchdog) = watchdog.as_mut() {
                    watchdog.on_primary_fix(Instant::now());
                }
                *counts.entry(fix.provider).or_default() += 1;
                print_fix(&fix, args.json);
            }
            received = fixes.recv() => match received {
                Ok(fix) => {
                    *counts.entry(fix.provider).or_default() += 1;
                    print_fix(&fix, args.json);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Output fell behind, fixes dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    service.stop();
    if watchdog.is_some() {
        let _ = host.remove_updates(PRIMARY_PROVIDER);
    }
    shutdown.cancel();
    if let Err(e) = feed.await {
        warn!(error = %e, "Simulated feed task failed");
    }

    eprintln!();
    eprintln!("Session Summary");
    eprintln!("───────────────");
    for (provider, count) in &counts {
        eprintln!("  {:<10} {} fixes", provider.as_str(), count);
    }
    for provider in service.providers() {
        if !counts.contains_key(provider) {
            eprintln!("  {:<10} 0 fixes", provider.as_str());
        }
    }
    if let Some(watchdog) = &watchdog {
        eprintln!("  Primary timeouts: {}", watchdog.problem_count());
    }
    if let Some(fix) = service.last_known_fix() {
        eprintln!("  Last known: {}", fix);
    }
}

fn handle_watchdog(
    watchdog: &mut FallbackWatchdog,
    service: &LocationService,
    host: &dyn ProviderHost,
    primary_request: &UpdateRequest,
    primary_tx: &mpsc::UnboundedSender<Fix>,
) {
    match watchdog.on_deadline(Instant::now()) {
        WatchdogAction::StartFallback => {
            warn!(
                problems = watchdog.problem_count(),
                "No primary fix within timeout, starting location service"
            );
            if let Err(e) = host.remove_updates(PRIMARY_PROVIDER) {
                warn!(error = %e, "Failed to remove primary registration");
            }
            service.start_if_not_running();
        }
        WatchdogAction::ResumePrimary => {
            info!("Fallback window elapsed, switching back to primary provider");
            service.stop();
            if let Err(e) = register_primary(host, primary_request, primary_tx) {
                warn!(error = %e, "Failed to re-register primary provider");
            }
        }
    }
}
