use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use clap::{ArgAction, Parser};
use log::{error, info, LevelFilter};
use tokio::io::{stdin, BufReader};

use crate::alert::sink::{AlertSink, TerminalAlert};
use crate::config::io::ConfigIO;
use crate::console::spawn_console_presenter;
use crate::control::spawn_control_input;
use crate::error::AppRunError;
use crate::link::constants::{DEFAULT_ENDPOINT, RECONNECT_DELAY, SUBSCRIBER_BUFFER};
use crate::link::publisher::StatusPublisher;
use crate::link::types::{InterfacePolicy, LinkConfig};
use crate::monitor::Monitor;
use crate::threshold::{Threshold, ThresholdStore};

pub mod alert;
pub mod config;
pub mod console;
pub mod control;
pub mod error;
pub mod link;
pub mod monitor;
pub mod threshold;

/// Watches trailer tilt telemetry from the sensor and alerts when the critical angle is exceeded.
///
/// While running, type a number (or `set <degrees>`) to change the critical angle, or `status`.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// WebSocket endpoint of the tilt sensor
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Interface to connect through: "wifi", "any" or an interface name
    #[arg(long, default_value = "wifi")]
    pub interface: InterfacePolicy,

    /// Set and save a new critical angle (degrees) before connecting
    #[arg(long)]
    pub critical_angle: Option<Threshold>,

    /// Settings file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Do not read or write the settings file
    #[arg(long, conflicts_with = "config")]
    pub no_persist: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

pub fn init_logging(level: LevelFilter) -> Result<(), fern::InitError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(fern::log_file(log_file)?);
    }

    dispatch.apply()?;
    Ok(())
}

async fn run_monitor(args: Args) -> Result<(), AppRunError> {
    let mut config_io = match (&args.config, args.no_persist) {
        (_, true) => None,
        (Some(path), false) => Some(ConfigIO::open_sync(path)?),
        (None, false) => Some(ConfigIO::new_sync()?),
    };

    // hold an exclusive lock on the settings file so that only one monitor runs against it
    let mut config_locker = match config_io.as_mut() {
        Some(config_io) => Some(config_io.locker()?),
        None => None,
    };
    let _lock_guard = match config_locker.as_mut() {
        Some(locker) => Some(locker.lock()?),
        None => None,
    };

    let thresholds = match &config_io {
        Some(config_io) => ThresholdStore::load(config_io.clone()).await?,
        None => ThresholdStore::in_memory(Threshold::default()),
    };

    if let Some(critical_angle) = args.critical_angle {
        thresholds.set(critical_angle).await?;
    }

    let link_config = LinkConfig {
        endpoint: args.endpoint,
        interface: args.interface,
        reconnect_delay: Duration::from_millis(RECONNECT_DELAY),
    };

    let publisher = StatusPublisher::new();
    let events = publisher.subscribe(SUBSCRIBER_BUFFER);
    let alert: Arc<dyn AlertSink> = Arc::new(TerminalAlert::new());
    let mut monitor = Monitor::start(link_config, thresholds.clone(), publisher.clone(), alert);

    let presenter = spawn_console_presenter(events, monitor.cancel_token(), thresholds.clone());
    let control = spawn_control_input(
        BufReader::new(stdin()),
        monitor.cancel_token(),
        thresholds,
        publisher,
    );

    let result = tokio::signal::ctrl_c().await;
    info!("Shutting down");

    monitor.shutdown().await;
    // a pending stdin read cannot be interrupted; the runtime is shut down without waiting for it
    control.abort();
    if let Err(err) = presenter.await {
        error!("Console presenter failed: {}", err);
    }

    result?;
    Ok(())
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run_monitor(args));
    runtime.shutdown_background();
    result
}
