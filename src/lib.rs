//! # Buoy Monitor Library
//!
//! Duty-cycled environmental sensing and telemetry for an unattended
//! monitoring buoy.
//!
//! This library provides the sampling-and-reporting duty-cycle core: the
//! cadence scheduler, the GNSS fix acquisition state machine, the per-channel
//! sample aggregator, and the telemetry record assembler, plus the gateway
//! and sensor seams they run against.

pub mod config;
pub mod cycle;
pub mod error;
pub mod location;
pub mod record;
pub mod sampling;
pub mod schedule;
pub mod sensors;
pub mod transport;
