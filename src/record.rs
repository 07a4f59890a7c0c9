//! # Telemetry Record Assembly
//!
//! Composes the cycle's aggregated readings and resolved location/time into
//! one structured record and hands it to the gateway for synchronized
//! delivery.
//!
//! Assembly always works from [`CycleState`], which carries the last-known
//! reading per channel and the last resolved fix. A cycle whose acquisition
//! timed out, or whose sensor failed outright, therefore reports stale values
//! rather than holes in the record.

use chrono::{DateTime, Datelike, Local, Timelike, TimeZone};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::TelemetryConfig;
use crate::location::LocationFix;
use crate::sampling::{AggregatedReading, FieldValue};
use crate::transport::Gateway;

/// Zero-padded calendar decomposition of a fix timestamp in local time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFields {
    /// 4-digit year
    pub year: String,
    /// 2-digit month
    pub month: String,
    /// 2-digit day
    pub day: String,
    /// 2-digit hour
    pub hour: String,
    /// 2-digit minute
    pub minute: String,
    /// 2-digit second
    pub second: String,
}

impl TimeFields {
    /// Decompose an epoch timestamp using the local calendar
    pub fn from_epoch_local(epoch: u64) -> Self {
        let utc = DateTime::from_timestamp(epoch as i64, 0).unwrap_or(DateTime::UNIX_EPOCH);
        Self::from_datetime(&utc.with_timezone(&Local))
    }

    /// Decompose an already-zoned datetime
    pub fn from_datetime<Tz: TimeZone>(datetime: &DateTime<Tz>) -> Self {
        Self {
            year: format!("{:04}", datetime.year()),
            month: format!("{:02}", datetime.month()),
            day: format!("{:02}", datetime.day()),
            hour: format!("{:02}", datetime.hour()),
            minute: format!("{:02}", datetime.minute()),
            second: format!("{:02}", datetime.second()),
        }
    }
}

/// Process-wide state surviving across cycles
///
/// Initialized once at startup with zero/invalid placeholders, mutated in
/// place every cycle, never torn down.
pub struct CycleState {
    fix: LocationFix,
    readings: Vec<AggregatedReading>,
}

impl CycleState {
    pub fn new() -> Self {
        Self {
            fix: LocationFix::unknown(),
            readings: Vec::new(),
        }
    }

    pub fn fix(&self) -> &LocationFix {
        &self.fix
    }

    pub fn update_fix(&mut self, fix: LocationFix) {
        self.fix = fix;
    }

    /// Replace the last-known reading for the reading's channel
    pub fn update_reading(&mut self, reading: AggregatedReading) {
        match self.readings.iter_mut().find(|r| r.channel == reading.channel) {
            Some(slot) => *slot = reading,
            None => self.readings.push(reading),
        }
    }

    pub fn readings(&self) -> &[AggregatedReading] {
        &self.readings
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}

/// One outbound telemetry document, built fresh each cycle
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord(pub Map<String, Value>);

/// Builds and sends the per-cycle telemetry record
pub struct TelemetryAssembler {
    file: String,
    sync: bool,
}

impl TelemetryAssembler {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            file: config.file.clone(),
            sync: config.sync,
        }
    }

    /// Compose the record from the cycle state
    ///
    /// Pure data transformation: time fields from the last fix's epoch in the
    /// local calendar, the truncated coordinates, and every channel's current
    /// (or last-known) reading under its original key names.
    pub fn assemble(&self, state: &CycleState) -> TelemetryRecord {
        let mut body = Map::new();

        let time = TimeFields::from_epoch_local(state.fix().epoch);
        body.insert("YYYY".to_string(), json!(time.year));
        body.insert("MM".to_string(), json!(time.month));
        body.insert("DD".to_string(), json!(time.day));
        body.insert("hh".to_string(), json!(time.hour));
        body.insert("mm".to_string(), json!(time.minute));
        body.insert("ss".to_string(), json!(time.second));
        body.insert("lat".to_string(), json!(state.fix().lat));
        body.insert("lon".to_string(), json!(state.fix().lon));

        for reading in state.readings() {
            for (name, value) in &reading.values {
                let value = match value {
                    FieldValue::Float(v) => json!(v),
                    FieldValue::Count(c) => json!(c),
                };
                body.insert((*name).to_string(), value);
            }
        }

        TelemetryRecord(body)
    }

    /// Hand the record to the gateway for synchronized delivery
    ///
    /// A failed send drops the record: there is no local retry and no
    /// persistent queue, so that cycle's data is lost. This is a known gap
    /// carried over from the deployed firmware; the next cycle proceeds
    /// regardless.
    pub async fn send(&self, record: TelemetryRecord, gateway: &mut dyn Gateway) -> bool {
        match gateway
            .add_note(&self.file, self.sync, Value::Object(record.0))
            .await
        {
            Ok(()) => {
                info!("Telemetry record sent to {}", self.file);
                true
            }
            Err(e) => {
                warn!("Send failed, dropping this cycle's record: {e}");
                false
            }
        }
    }
}
