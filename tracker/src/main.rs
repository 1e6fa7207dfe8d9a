//! # Asset tracker
//!
//! Host build of the tracker firmware. Every driver is simulated (see
//! [`sim`]); the module fabric in `tracker_core` runs unchanged.
//!
//! A requested reset stops all modules and boots a fresh system, the way
//! the device reboots. `--no-reboot` exits instead.

mod sim;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tracker_common::prelude::*;
use tracker_common::settings::FileSettingsStore;
use tracker_common::watchdog::{SoftwareWatchdog, Watchdog, WatchdogHandler};
use tracker_core::codec::JsonCodec;
use tracker_core::{Backends, RuntimeConfig, System};

use sim::{
    ChannelReset, LogTransport, SimClock, SimLocation, SimModem, SimSensor, SimUi, SimWatchdog,
};

const WATCHDOG_TIMEOUT_MS: u64 = 60_000;
const WATCHDOG_FEED: Duration = Duration::from_secs(20);

/// Asset tracker firmware, host simulation
#[derive(Parser, Debug)]
#[command(name = "tracker")]
#[command(version)]
#[command(about = "Event-driven asset tracker running on simulated drivers")]
struct Args {
    /// Path to tracker.toml. Built-in defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Exit on a reset request instead of rebooting.
    #[arg(long)]
    no_reboot: bool,

    /// Simulate accelerometer movement every SECS seconds.
    #[arg(long, value_name = "SECS")]
    movement_every: Option<u64>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = load_config(&args);
    let level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {e}");
            process::exit(1);
        }
    };

    info!(
        "{} v{} starting...",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(&args, &config).await {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Tracker shutdown complete");
}

fn load_config(args: &Args) -> Result<TrackerConfig, ConfigError> {
    let config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// `--verbose` wins over `[shared].log_level`; `RUST_LOG` refines both.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        level
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

fn backends(args: &Args, config: &TrackerConfig, reset: ChannelReset) -> Backends {
    Backends {
        modem: Box::new(SimModem::default()),
        location: Box::new(SimLocation::default()),
        sensor: Box::new(SimSensor::new(
            args.movement_every.map(Duration::from_secs),
        )),
        ui: Box::new(SimUi::default()),
        transport: Box::new(LogTransport::default()),
        codec: Box::new(JsonCodec),
        clock: Box::new(SimClock),
        settings: Arc::new(FileSettingsStore::new(&config.storage.settings_dir)),
        reset: Arc::new(reset),
    }
}

/// Feed the simulated hardware watchdog and report when its software
/// shadow runs out.
fn start_watchdog() -> Result<Vec<JoinHandle<()>>, Box<dyn std::error::Error>> {
    let shadow = Arc::new(SoftwareWatchdog::new());
    let mut hardware = SimWatchdog::default();
    hardware.register(Arc::clone(&shadow) as Arc<dyn WatchdogHandler>)?;
    let feeder = hardware.start(WATCHDOG_TIMEOUT_MS, WATCHDOG_FEED);

    let monitor = tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        let mut reported = false;
        loop {
            tick.tick().await;
            let expired = shadow.is_expired(Instant::now());
            if expired && !reported {
                error!("Watchdog not fed within {:?}", shadow.period());
            }
            reported = expired;
        }
    });
    Ok(vec![feeder, monitor])
}

async fn run(args: &Args, config: &TrackerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let watchdog = start_watchdog()?;
    let runtime = RuntimeConfig::from(config);
    let mut boots = 0u32;

    loop {
        boots += 1;
        let (reset_tx, mut reset_rx) = mpsc::unbounded_channel::<ShutdownReason>();
        let system = System::start(runtime, backends(args, config, ChannelReset(reset_tx)))?;
        info!("Boot #{boots} complete");

        tokio::select! {
            reason = reset_rx.recv() => {
                system.stop();
                match reason {
                    Some(reason) if !args.no_reboot => {
                        info!("Rebooting ({reason:?})");
                    }
                    Some(reason) => {
                        info!("Reset requested ({reason:?}), exiting");
                        break;
                    }
                    None => {
                        warn!("Reset channel closed");
                        break;
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Unable to listen for shutdown signal: {e}");
                }
                info!("Received Ctrl+C, stopping modules");
                system.stop();
                break;
            }
        }
    }

    for task in watchdog {
        task.abort();
    }
    Ok(())
}
