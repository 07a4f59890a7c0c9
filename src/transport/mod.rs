//! # Transport Module
//!
//! The gateway seam between the duty-cycle core and the Notecard-style
//! telemetry device. The core only ever talks to [`Gateway`]; the serial
//! implementation lives in [`notecard`].
//!
//! All gateway operations are synchronous request/response exchanges and may
//! fail independently of each other. None are idempotent from the core's
//! perspective.

pub mod notecard;
pub mod port;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Snapshot of the gateway's location subsystem.
///
/// Fields the gateway omitted are `None`; the original firmware treated a
/// missing timestamp as zero, which callers reproduce with `unwrap_or(0)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationRecord {
    /// Timestamp of the fix embedded in the record (UTC epoch seconds)
    pub time: Option<u64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Explicit "cannot resolve a location" indicator
    pub stop: bool,
}

/// Operating mode of the gateway's location subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMode {
    /// Low-power periodic updates at the given interval
    Periodic { seconds: u32 },
    /// Continuous acquisition; high power draw, must always be paired with a
    /// later restore to a low-power mode
    Continuous,
    /// Location subsystem disabled
    Off,
}

impl LocationMode {
    /// Wire name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationMode::Periodic { .. } => "periodic",
            LocationMode::Continuous => "continuous",
            LocationMode::Off => "off",
        }
    }
}

/// Request/response operations the duty-cycle core needs from the gateway
#[async_trait]
pub trait Gateway: Send {
    /// Fetch the current location record
    async fn location(&mut self) -> Result<LocationRecord>;

    /// Fetch the gateway's clock (UTC epoch seconds)
    async fn clock_time(&mut self) -> Result<u64>;

    /// Switch the location subsystem's operating mode
    async fn set_location_mode(&mut self, mode: LocationMode) -> Result<()>;

    /// Queue a telemetry note; `sync` requests an immediate flush rather than
    /// the gateway's own batching
    async fn add_note(&mut self, file: &str, sync: bool, body: Value) -> Result<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_mode_wire_names() {
        assert_eq!(LocationMode::Periodic { seconds: 300 }.as_str(), "periodic");
        assert_eq!(LocationMode::Continuous.as_str(), "continuous");
        assert_eq!(LocationMode::Off.as_str(), "off");
    }

    #[test]
    fn test_location_record_defaults() {
        let record = LocationRecord::default();
        assert_eq!(record.time, None);
        assert_eq!(record.lat, None);
        assert_eq!(record.lon, None);
        assert!(!record.stop);
    }
}
