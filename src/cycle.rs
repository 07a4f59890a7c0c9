//! # Cycle Runner
//!
//! Glues the four duty-cycle pieces together: wait for the boundary, resolve
//! a fix, sample every enabled channel, assemble and send the record.
//!
//! All collaborators are owned, injected instances; there are no ambient
//! singletons. Failures inside a cycle are handled where they occur and never
//! prevent the next cycle's wait from starting.

use tracing::{info, warn};

use crate::config::Config;
use crate::location::{AcquisitionOutcome, LocationAcquisition};
use crate::record::{CycleState, TelemetryAssembler};
use crate::sampling::SampleAggregator;
use crate::schedule::DutyCycleScheduler;
use crate::sensors::SensorChannel;
use crate::transport::Gateway;

/// Owns the duty-cycle components and the state surviving across cycles
pub struct CycleRunner {
    scheduler: DutyCycleScheduler,
    acquisition: LocationAcquisition,
    aggregator: SampleAggregator,
    assembler: TelemetryAssembler,
    state: CycleState,
}

impl CycleRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            scheduler: DutyCycleScheduler::new(&config.schedule),
            acquisition: LocationAcquisition::new(&config.location),
            aggregator: SampleAggregator::new(&config.sampling),
            assembler: TelemetryAssembler::new(&config.telemetry),
            state: CycleState::new(),
        }
    }

    /// Block until the next cycle boundary
    pub async fn wait_for_next_cycle(&self, gateway: &mut dyn Gateway) {
        self.scheduler.wait_for_next_cycle(gateway).await;
    }

    /// Run one acquire-aggregate-assemble-send cycle
    ///
    /// Returns whether the record was delivered. Every failure mode inside
    /// the cycle degrades to last-known values; nothing propagates out.
    pub async fn run_cycle(
        &mut self,
        gateway: &mut dyn Gateway,
        channels: &mut [Box<dyn SensorChannel>],
    ) -> bool {
        match self.acquisition.acquire(gateway).await {
            AcquisitionOutcome::Resolved(fix) => self.state.update_fix(fix),
            outcome => {
                info!("No fresh fix ({outcome:?}), reusing last-known location");
            }
        }

        for channel in channels.iter_mut() {
            match self.aggregator.aggregate(channel.as_mut()).await {
                Some(reading) => self.state.update_reading(reading),
                None => {
                    warn!("{}: keeping last-known reading", channel.label());
                }
            }
        }

        let record = self.assembler.assemble(&self.state);
        self.assembler.send(record, gateway).await
    }

    /// Last-known readings and fix
    pub fn state(&self) -> &CycleState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ChannelConfig, GatewayConfig, LocationConfig, LogConfig, RestoreMode, SamplingConfig,
        ScheduleConfig, SchedulePolicy, TelemetryConfig,
    };
    use crate::sensors::mocks::{ScriptedChannel, TEST_FIELDS};
    use crate::transport::mocks::ScriptedGateway;
    use crate::transport::{LocationMode, LocationRecord};
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            gateway: GatewayConfig {
                port: "/dev/null".to_string(),
                baud_rate: 9600,
                response_timeout_ms: 500,
                product_uid: String::new(),
                hub_mode: "periodic".to_string(),
                inbound_minutes: 720,
                outbound_minutes: 30,
            },
            schedule: ScheduleConfig {
                policy: SchedulePolicy::Aligned,
                period_s: 900,
                retry_delay_ms: 1000,
            },
            sampling: SamplingConfig {
                count: 10,
                interval_ms: 500,
            },
            location: LocationConfig {
                poll_interval_ms: 2000,
                timeout_s: 600,
                restore_mode: RestoreMode::Periodic,
                periodic_seconds: 300,
            },
            channels: ChannelConfig {
                temp_humidity: true,
                power: false,
                particulate: false,
            },
            telemetry: TelemetryConfig {
                file: "data.qo".to_string(),
                sync: true,
            },
            log: LogConfig { dir: String::new() },
        }
    }

    fn fix_record(time: u64) -> LocationRecord {
        LocationRecord {
            time: Some(time),
            lat: Some(44.974599),
            lon: Some(-93.235499),
            stop: false,
        }
    }

    fn channels_with_reads(value: f64) -> Vec<Box<dyn SensorChannel>> {
        vec![Box::new(ScriptedChannel::with_reads(
            TEST_FIELDS,
            vec![value],
            10,
        ))]
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_sends_record() {
        let mut gateway = ScriptedGateway::new();
        gateway.push_location(fix_record(1000)); // baseline
        gateway.push_location(fix_record(1120)); // fresh fix

        let mut channels = channels_with_reads(21.456);
        let mut runner = CycleRunner::new(&test_config());

        assert!(runner.run_cycle(&mut gateway, &mut channels).await);

        let (file, sync, body) = &gateway.notes[0];
        assert_eq!(file, "data.qo");
        assert!(*sync);
        assert_eq!(body["lat"], json!(44.97459));
        assert_eq!(body["lon"], json!(-93.23549));
        assert_eq!(body["temperature"], json!(21.45));

        // The acquisition switched to continuous and restored exactly once
        assert_eq!(
            gateway.mode_calls,
            vec![
                LocationMode::Continuous,
                LocationMode::Periodic { seconds: 300 }
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reuses_last_known_fix() {
        let mut runner = CycleRunner::new(&test_config());

        // First cycle resolves a fix
        let mut gateway = ScriptedGateway::new();
        gateway.push_location(fix_record(1000));
        gateway.push_location(fix_record(1120));
        let mut channels = channels_with_reads(21.0);
        runner.run_cycle(&mut gateway, &mut channels).await;

        // Second cycle: fix timestamp never changes for the full ceiling
        let mut gateway = ScriptedGateway::new();
        gateway.push_location(fix_record(1120));
        gateway.default_location = Some(fix_record(1120));
        let mut channels = channels_with_reads(22.0);
        assert!(runner.run_cycle(&mut gateway, &mut channels).await);

        // Mode restored despite the timeout, stale coordinates reported
        assert_eq!(
            gateway.mode_requests(LocationMode::Periodic { seconds: 300 }),
            1
        );
        let (_, _, body) = &gateway.notes[0];
        assert_eq!(body["lat"], json!(44.97459));
        assert_eq!(body["temperature"], json!(22.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_channel_keeps_last_known_reading() {
        let mut runner = CycleRunner::new(&test_config());

        let mut gateway = ScriptedGateway::new();
        gateway.push_location(fix_record(1000));
        gateway.push_location(fix_record(1120));
        let mut channels = channels_with_reads(21.456);
        runner.run_cycle(&mut gateway, &mut channels).await;

        // Second cycle: acquisition aborts, all sensor reads fail
        let mut gateway = ScriptedGateway::new();
        let mut channels: Vec<Box<dyn SensorChannel>> =
            vec![Box::new(ScriptedChannel::new(TEST_FIELDS))];
        assert!(runner.run_cycle(&mut gateway, &mut channels).await);

        // Last-known temperature from the first cycle still reported
        let (_, _, body) = &gateway.notes[0];
        assert_eq!(body["temperature"], json!(21.45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_does_not_unwind() {
        let mut gateway = ScriptedGateway::new();
        gateway.push_location(fix_record(1000));
        gateway.push_location(fix_record(1120));
        gateway.note_error = true;

        let mut channels = channels_with_reads(21.0);
        let mut runner = CycleRunner::new(&test_config());

        // The failed send is reported, not propagated
        assert!(!runner.run_cycle(&mut gateway, &mut channels).await);
        assert_eq!(runner.state().readings().len(), 1);
    }
}
