//! Deterministic stand-in drivers used until the real I2C sensors are wired.
//!
//! Each simulated channel produces a plausible baseline value with a small
//! repeatable wobble so aggregated output varies between cycles without any
//! randomness in tests or in the field logs.

use async_trait::async_trait;

use crate::error::Result;
use crate::sensors::{
    FieldSpec, SensorChannel, PARTICULATE_FIELDS, POWER_FIELDS, TEMP_HUMIDITY_FIELDS,
};

/// Repeatable wobble in [-0.5, 0.5) derived from a read counter
fn wobble(tick: u64, salt: u64) -> f64 {
    (((tick.wrapping_mul(31).wrapping_add(salt.wrapping_mul(17))) % 100) as f64 - 50.0) / 100.0
}

/// Simulated temperature/humidity sensor (AHT20 stand-in)
pub struct SimTempHumidity {
    tick: u64,
}

impl SimTempHumidity {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SimTempHumidity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorChannel for SimTempHumidity {
    fn label(&self) -> &'static str {
        "temp_humidity"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        TEMP_HUMIDITY_FIELDS
    }

    async fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    async fn read(&mut self) -> Option<Vec<f64>> {
        self.tick += 1;
        Some(vec![
            21.4 + wobble(self.tick, 1),
            48.0 + 2.0 * wobble(self.tick, 2),
        ])
    }
}

/// Simulated current/voltage/power monitor (INA260 stand-in)
pub struct SimPowerMonitor {
    tick: u64,
}

impl SimPowerMonitor {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SimPowerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorChannel for SimPowerMonitor {
    fn label(&self) -> &'static str {
        "power"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        POWER_FIELDS
    }

    async fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    async fn read(&mut self) -> Option<Vec<f64>> {
        self.tick += 1;
        let current_ma = 120.0 + 10.0 * wobble(self.tick, 3);
        let voltage_mv = 12600.0 + 50.0 * wobble(self.tick, 4);
        let power_mw = current_ma * voltage_mv / 1000.0;
        Some(vec![current_ma, voltage_mv, power_mw])
    }
}

/// Simulated particulate sensor (PMSA003I stand-in)
pub struct SimParticulate {
    tick: u64,
}

impl SimParticulate {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SimParticulate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorChannel for SimParticulate {
    fn label(&self) -> &'static str {
        "particulate"
    }

    fn fields(&self) -> &'static [FieldSpec] {
        PARTICULATE_FIELDS
    }

    async fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    async fn read(&mut self) -> Option<Vec<f64>> {
        self.tick += 1;
        let w = wobble(self.tick, 5);
        Some(vec![
            // Concentrations (ug/m3), standard then environmental
            4.0 + w,
            6.0 + w,
            7.0 + w,
            4.0 + w,
            6.0 + w,
            7.0 + w,
            // Particle bin counts per 0.1L of air
            540.0 + 20.0 * w,
            160.0 + 10.0 * w,
            25.0 + 4.0 * w,
            4.0 + 2.0 * w,
            1.0 + w,
            0.0,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_match_field_tables() {
        let mut temp = SimTempHumidity::new();
        let mut power = SimPowerMonitor::new();
        let mut particulate = SimParticulate::new();

        assert_eq!(temp.read().await.unwrap().len(), temp.fields().len());
        assert_eq!(power.read().await.unwrap().len(), power.fields().len());
        assert_eq!(
            particulate.read().await.unwrap().len(),
            particulate.fields().len()
        );
    }

    #[tokio::test]
    async fn test_values_are_deterministic() {
        let mut a = SimTempHumidity::new();
        let mut b = SimTempHumidity::new();
        for _ in 0..5 {
            assert_eq!(a.read().await, b.read().await);
        }
    }

    #[tokio::test]
    async fn test_begin_succeeds() {
        assert!(SimTempHumidity::new().begin().await.is_ok());
        assert!(SimPowerMonitor::new().begin().await.is_ok());
        assert!(SimParticulate::new().begin().await.is_ok());
    }

    #[test]
    fn test_wobble_is_bounded() {
        for tick in 0..200 {
            let w = wobble(tick, 7);
            assert!((-0.5..0.5).contains(&w), "wobble out of range: {w}");
        }
    }
}
