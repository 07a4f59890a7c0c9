//! # Location Acquisition
//!
//! Resolves a GNSS fix through the gateway's store-and-poll protocol.
//!
//! The gateway keeps its location subsystem in a low-power mode between
//! cycles. Acquisition records the timestamp of whatever fix the gateway
//! currently holds (the baseline), switches the subsystem to continuous
//! acquisition, then polls until a record with a *different* fix timestamp
//! appears. The first differing response is accepted unconditionally.
//!
//! Whatever happens - fresh fix, timeout, no-signal indicator, or a failed
//! mode switch - exactly one restore request returns the subsystem to its
//! configured low-power mode before control leaves this module. The one
//! exception is a failed baseline query: acquisition then aborts before any
//! mode change has been requested (fail closed).

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::{LocationConfig, RestoreMode};
use crate::sampling::truncate_decimals;
use crate::transport::{Gateway, LocationMode};

/// Decimal places kept on latitude/longitude (about 1.1 m of resolution)
const COORDINATE_DECIMALS: u32 = 5;

/// A resolved GNSS position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    /// Fix timestamp (UTC epoch seconds)
    pub epoch: u64,
    pub lat: f64,
    pub lon: f64,
}

impl LocationFix {
    /// Zero/invalid placeholder used until the first successful acquisition
    pub fn unknown() -> Self {
        Self { epoch: 0, lat: 0.0, lon: 0.0 }
    }
}

/// Terminal state of one acquisition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    /// A fresh fix was captured
    Resolved(LocationFix),
    /// The polling ceiling elapsed without a fresh fix
    TimedOut,
    /// The gateway reported it cannot resolve a location
    NoSignal,
    /// Acquisition aborted before polling began
    Aborted,
}

/// GNSS fix acquisition state machine
pub struct LocationAcquisition {
    poll_interval: Duration,
    timeout: Duration,
    restore_mode: LocationMode,
}

impl LocationAcquisition {
    pub fn new(config: &LocationConfig) -> Self {
        let restore_mode = match config.restore_mode {
            RestoreMode::Periodic => LocationMode::Periodic {
                seconds: config.periodic_seconds,
            },
            RestoreMode::Off => LocationMode::Off,
        };
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_secs(config.timeout_s),
            restore_mode,
        }
    }

    /// Run one acquisition attempt to a terminal state
    ///
    /// The gateway is never left in continuous mode: every path that follows
    /// the mode switch issues exactly one restore request before returning.
    pub async fn acquire(&self, gateway: &mut dyn Gateway) -> AcquisitionOutcome {
        // Baseline query: the stored fix timestamp we must see change
        let baseline = match gateway.location().await {
            Ok(record) => record.time.unwrap_or(0),
            Err(e) => {
                warn!("Failed to fetch baseline location: {e}");
                return AcquisitionOutcome::Aborted;
            }
        };
        debug!("Baseline fix timestamp: {baseline}");

        if let Err(e) = gateway.set_location_mode(LocationMode::Continuous).await {
            warn!("Failed to switch to continuous mode: {e}");
            // The subsystem's mode is unknown after a failed switch; restore
            // rather than risk leaving it in continuous acquisition
            self.restore(gateway).await;
            return AcquisitionOutcome::Aborted;
        }

        let outcome = self.poll_for_fix(gateway, baseline).await;
        self.restore(gateway).await;
        outcome
    }

    /// Poll until a fresh fix, a stop indicator, or the monotonic ceiling
    async fn poll_for_fix(&self, gateway: &mut dyn Gateway, baseline: u64) -> AcquisitionOutcome {
        let deadline = Instant::now() + self.timeout;

        loop {
            if Instant::now() >= deadline {
                warn!("Timed out looking for a location");
                return AcquisitionOutcome::TimedOut;
            }

            match gateway.location().await {
                Ok(record) => {
                    let time = record.time.unwrap_or(0);
                    if time != baseline {
                        let fix = LocationFix {
                            epoch: time,
                            lat: truncate_decimals(record.lat.unwrap_or(0.0), COORDINATE_DECIMALS),
                            lon: truncate_decimals(record.lon.unwrap_or(0.0), COORDINATE_DECIMALS),
                        };
                        info!("Resolved fix at {}, {} (t={})", fix.lat, fix.lon, fix.epoch);
                        return AcquisitionOutcome::Resolved(fix);
                    }

                    if record.stop {
                        warn!("Found a stop flag, cannot find location");
                        return AcquisitionOutcome::NoSignal;
                    }
                }
                Err(e) => {
                    // A failed poll is no new data this iteration, not an abort
                    warn!("Location poll failed: {e}");
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Return the gateway to its configured low-power location mode
    async fn restore(&self, gateway: &mut dyn Gateway) {
        if let Err(e) = gateway.set_location_mode(self.restore_mode).await {
            warn!("Failed to restore location mode: {e}");
        }
    }
}
