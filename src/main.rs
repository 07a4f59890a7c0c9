//! # Buoy Monitor
//!
//! Duty-cycled environmental sensing and telemetry for an unattended
//! monitoring buoy.
//!
//! One logical task runs forever: wait for the next duty-cycle boundary,
//! resolve a GNSS fix through the gateway, sample every enabled sensor
//! channel, then send one telemetry record. Every wait is an explicit sleep;
//! there is no other work to interleave.

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod cycle;
mod error;
mod location;
mod record;
mod sampling;
mod schedule;
mod sensors;
mod transport;

use config::Config;
use cycle::CycleRunner;
use transport::notecard::NotecardGateway;

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Main entry point for the buoy monitor
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging (stderr, plus a rolling file when configured)
///    - Load and validate configuration
///    - Open the gateway serial port and provision the hub link
///    - Initialize every enabled sensor channel; any failure here is fatal
///
/// 2. **Duty loop**
///    - Wait for the next cycle boundary (fixed period or clock-aligned)
///    - Acquire a GNSS fix, sample channels, assemble and send the record
///    - Handle Ctrl+C between cycles for graceful shutdown
///
/// # Errors
///
/// Returns error if the configuration is invalid, the gateway port cannot be
/// opened, or a sensor fails to initialize. Once the duty loop starts, no
/// failure terminates the process.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    // Keep the file-appender guard alive for the process lifetime
    let _log_guard = init_logging(&config);

    info!("Buoy monitor v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {config_path}");

    let mut gateway = NotecardGateway::open(&config.gateway)
        .context("gateway serial port is required at startup")?;
    info!("Gateway serial port opened at: {}", gateway.device_path());

    let runner = CycleRunner::new(&config);
    let initial_mode = location_restore_mode(&config);
    gateway.provision(&config.gateway, initial_mode).await;

    // Sensor initialization failure is fatal: halt rather than run cycles
    // with a missing sensor
    let mut channels = sensors::active_channels(&config.channels);
    for channel in channels.iter_mut() {
        channel
            .begin()
            .await
            .with_context(|| format!("sensor '{}' failed to initialize", channel.label()))?;
        info!("Sensor channel '{}' initialized", channel.label());
    }

    run_duty_loop(runner, &mut gateway, &mut channels).await;

    Ok(())
}

/// Run cycles until Ctrl+C
///
/// The shutdown signal is only honored during the duty-cycle wait: once a
/// cycle's acquisition begins it runs to a terminal state, preserving the
/// mode-restore guarantee.
async fn run_duty_loop(
    mut runner: CycleRunner,
    gateway: &mut NotecardGateway<transport::port::TokioSerialPort>,
    channels: &mut [Box<dyn sensors::SensorChannel>],
) {
    let mut cycle_count: u64 = 0;

    loop {
        tokio::select! {
            _ = runner.wait_for_next_cycle(gateway) => {
                cycle_count += 1;
                info!("Cycle {cycle_count} starting");
                if runner.run_cycle(gateway, channels).await {
                    info!("Cycle {cycle_count} complete, record delivered");
                } else {
                    warn!("Cycle {cycle_count} complete, record dropped");
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down after {cycle_count} cycles");
                break;
            }
        }
    }
}

/// The low-power location mode for this deployment
fn location_restore_mode(config: &Config) -> transport::LocationMode {
    match config.location.restore_mode {
        config::RestoreMode::Periodic => transport::LocationMode::Periodic {
            seconds: config.location.periodic_seconds,
        },
        config::RestoreMode::Off => transport::LocationMode::Off,
    }
}

/// Initialize stderr logging, plus a daily-rolling file when `log.dir` is set
fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if config.log.dir.is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.log.dir, "buoy-monitor.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    if let Err(e) = std::fs::metadata(&config.log.dir) {
        error!("Log directory {} is not accessible: {e}", config.log.dir);
    }

    Some(guard)
}
