//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The channel flags in [`ChannelConfig`] are the capability set: they decide
//! which sensor channels exist on a given deployment, and every enabled channel
//! is sampled through the same aggregation path.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub schedule: ScheduleConfig,
    pub sampling: SamplingConfig,
    pub location: LocationConfig,
    pub channels: ChannelConfig,
    pub telemetry: TelemetryConfig,
    pub log: LogConfig,
}

/// Gateway (Notecard) serial link and hub provisioning
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    #[serde(default)]
    pub product_uid: String,

    /// Hub communication mode requested at startup ("periodic" or "continuous")
    #[serde(default = "default_hub_mode")]
    pub hub_mode: String,

    #[serde(default = "default_inbound_minutes")]
    pub inbound_minutes: u32,

    #[serde(default = "default_outbound_minutes")]
    pub outbound_minutes: u32,
}

/// Duty-cycle scheduling policy
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePolicy {
    /// Sleep a fixed period between cycles; no drift correction
    Elapsed,
    /// Align cycle starts to absolute clock boundaries from the gateway
    Aligned,
}

/// Duty-cycle scheduler configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_policy")]
    pub policy: SchedulePolicy,

    #[serde(default = "default_period_s")]
    pub period_s: u64,

    /// Pause before retrying after a failed gateway clock fetch
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Per-channel sample aggregation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_sample_count")]
    pub count: u32,

    #[serde(default = "default_sample_interval_ms")]
    pub interval_ms: u64,
}

/// Location mode the gateway is returned to after each acquisition
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    Periodic,
    Off,
}

/// GNSS fix acquisition configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LocationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_location_timeout_s")]
    pub timeout_s: u64,

    #[serde(default = "default_restore_mode")]
    pub restore_mode: RestoreMode,

    /// Update interval used when `restore_mode` is `periodic`
    #[serde(default = "default_periodic_seconds")]
    pub periodic_seconds: u32,
}

/// Which sensor channels are fitted on this deployment
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_enabled")]
    pub temp_humidity: bool,

    #[serde(default = "default_channel_enabled")]
    pub power: bool,

    #[serde(default = "default_channel_enabled")]
    pub particulate: bool,
}

/// Outbound telemetry record configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_file")]
    pub file: String,

    /// Request immediate delivery instead of the gateway's own batching
    #[serde(default = "default_telemetry_sync")]
    pub sync: bool,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Directory for daily-rolling log files; empty disables file logging
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_gateway_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_response_timeout_ms() -> u64 { 5000 }
fn default_hub_mode() -> String { "periodic".to_string() }
fn default_inbound_minutes() -> u32 { 720 }
fn default_outbound_minutes() -> u32 { 30 }

fn default_schedule_policy() -> SchedulePolicy { SchedulePolicy::Aligned }
fn default_period_s() -> u64 { 900 }
fn default_retry_delay_ms() -> u64 { 1000 }

fn default_sample_count() -> u32 { 10 }
fn default_sample_interval_ms() -> u64 { 500 }

fn default_poll_interval_ms() -> u64 { 2000 }
fn default_location_timeout_s() -> u64 { 600 }
fn default_restore_mode() -> RestoreMode { RestoreMode::Periodic }
fn default_periodic_seconds() -> u32 { 300 }

fn default_channel_enabled() -> bool { true }

fn default_telemetry_file() -> String { "data.qo".to_string() }
fn default_telemetry_sync() -> bool { true }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.gateway.port.is_empty() {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("gateway port cannot be empty")
            ));
        }

        if self.gateway.response_timeout_ms == 0 || self.gateway.response_timeout_ms > 60000 {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("response_timeout_ms must be between 1 and 60000")
            ));
        }

        if self.schedule.period_s == 0 {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("schedule period_s must be at least 1")
            ));
        }

        if self.schedule.retry_delay_ms == 0 || self.schedule.retry_delay_ms > 60000 {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("retry_delay_ms must be between 1 and 60000")
            ));
        }

        if self.sampling.count == 0 {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("sampling count must be at least 1")
            ));
        }

        if self.location.poll_interval_ms == 0 {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("location poll_interval_ms must be at least 1")
            ));
        }

        if self.location.timeout_s == 0 {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("location timeout_s must be at least 1")
            ));
        }

        if self.location.restore_mode == RestoreMode::Periodic && self.location.periodic_seconds == 0 {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("periodic_seconds must be at least 1 when restore_mode is periodic")
            ));
        }

        if self.telemetry.file.is_empty() {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("telemetry file cannot be empty")
            ));
        }

        if !self.channels.temp_humidity && !self.channels.power && !self.channels.particulate {
            return Err(crate::error::BuoyError::Config(
                toml::de::Error::custom("at least one sensor channel must be enabled")
            ));
        }

        Ok(())
    }
}
