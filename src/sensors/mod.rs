//! # Sensor Channels
//!
//! The seam between the sampling core and the physical sensor drivers.
//!
//! A channel is an abstract source of one small group of readings (a
//! temperature/humidity pair, a power triple, a particulate block). Each
//! channel publishes a fixed field table naming its outputs and the
//! quantization applied to each after averaging; the aggregator iterates the
//! enabled channels uniformly instead of carrying per-sensor code paths.

pub mod sim;

use async_trait::async_trait;

use crate::config::ChannelConfig;
use crate::error::Result;

/// Quantization applied to one averaged field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantize {
    /// Truncate toward zero to this many decimal places
    Decimals(u32),
    /// Keep the averaged value as-is
    Raw,
    /// Round half away from zero and clamp into a 16-bit count
    Count,
}

/// One named output of a channel and its quantization policy
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Key used in the outbound telemetry record
    pub name: &'static str,
    pub policy: Quantize,
}

/// Field table for the temperature/humidity channel
pub const TEMP_HUMIDITY_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "temperature", policy: Quantize::Decimals(2) },
    FieldSpec { name: "humidity", policy: Quantize::Decimals(2) },
];

/// Field table for the current/voltage/power channel
pub const POWER_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "current", policy: Quantize::Raw },
    FieldSpec { name: "voltage", policy: Quantize::Raw },
    FieldSpec { name: "power", policy: Quantize::Raw },
];

/// Field table for the particulate channel: six concentration averages kept
/// raw, six particle bin counts narrowed to u16
pub const PARTICULATE_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "pm10_standard", policy: Quantize::Raw },
    FieldSpec { name: "pm25_standard", policy: Quantize::Raw },
    FieldSpec { name: "pm100_standard", policy: Quantize::Raw },
    FieldSpec { name: "pm10_env", policy: Quantize::Raw },
    FieldSpec { name: "pm25_env", policy: Quantize::Raw },
    FieldSpec { name: "pm100_env", policy: Quantize::Raw },
    FieldSpec { name: "particles_03um", policy: Quantize::Count },
    FieldSpec { name: "particles_05um", policy: Quantize::Count },
    FieldSpec { name: "particles_10um", policy: Quantize::Count },
    FieldSpec { name: "particles_25um", policy: Quantize::Count },
    FieldSpec { name: "particles_50um", policy: Quantize::Count },
    FieldSpec { name: "particles_100um", policy: Quantize::Count },
];

/// One sampled sensor
#[async_trait]
pub trait SensorChannel: Send {
    /// Short name used in diagnostics
    fn label(&self) -> &'static str;

    /// Outputs of this channel, in record order. Every successful read
    /// returns exactly `fields().len()` values in the same order.
    fn fields(&self) -> &'static [FieldSpec];

    /// Initialize the driver. Failure is fatal at startup: the device halts
    /// rather than running cycles with a missing sensor.
    async fn begin(&mut self) -> Result<()>;

    /// Take one reading; `None` means the driver had no data this attempt
    async fn read(&mut self) -> Option<Vec<f64>>;
}

/// Build the channel set for this deployment from the capability flags
//
// TODO: replace the simulated drivers with the AHT20, INA260 and PMSA003I
// I2C drivers once the sensor harness is wired to the host bus.
pub fn active_channels(config: &ChannelConfig) -> Vec<Box<dyn SensorChannel>> {
    let mut channels: Vec<Box<dyn SensorChannel>> = Vec::new();
    if config.temp_humidity {
        channels.push(Box::new(sim::SimTempHumidity::new()));
    }
    if config.power {
        channels.push(Box::new(sim::SimPowerMonitor::new()));
    }
    if config.particulate {
        channels.push(Box::new(sim::SimParticulate::new()));
    }
    channels
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_tables_match_record_keys() {
        let names: Vec<&str> = PARTICULATE_FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), 12);
        assert!(names.contains(&"pm25_standard"));
        assert!(names.contains(&"particles_100um"));

        assert_eq!(TEMP_HUMIDITY_FIELDS[0].name, "temperature");
        assert_eq!(TEMP_HUMIDITY_FIELDS[0].policy, Quantize::Decimals(2));
        assert_eq!(POWER_FIELDS.len(), 3);
    }

    #[test]
    fn test_active_channels_follow_capability_flags() {
        let config = ChannelConfig {
            temp_humidity: true,
            power: false,
            particulate: true,
        };
        let channels = active_channels(&config);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].label(), "temp_humidity");
        assert_eq!(channels[1].label(), "particulate");
    }

    #[test]
    fn test_no_channels_when_all_disabled() {
        let config = ChannelConfig {
            temp_humidity: false,
            power: false,
            particulate: false,
        };
        assert!(active_channels(&config).is_empty());
    }
}
