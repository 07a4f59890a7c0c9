//! # Sample Aggregation
//!
//! Fixed-count accumulate/average/quantize policy applied to every sensor
//! channel.
//!
//! Each cycle takes exactly `count` read attempts from a channel with a fixed
//! delay after every attempt. Failed reads are skipped, but the mean always
//! divides by the fixed attempt count, never by the number of successes: a
//! partially failing sensor biases its average toward zero instead of
//! inventing precision it does not have. This matches the deployed firmware
//! and is deliberate; see DESIGN.md before "fixing" it.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::SamplingConfig;
use crate::sensors::{Quantize, SensorChannel};

/// One quantized output value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Count(u16),
}

/// Averaged, quantized output of one channel for one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedReading {
    /// Channel label, used as the CycleState key
    pub channel: &'static str,
    /// `(record key, value)` pairs in the channel's field order
    pub values: Vec<(&'static str, FieldValue)>,
}

/// Fixed-count sample aggregator
pub struct SampleAggregator {
    count: u32,
    delay: Duration,
}

impl SampleAggregator {
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            count: config.count,
            delay: Duration::from_millis(config.interval_ms),
        }
    }

    /// Sample one channel and reduce the samples to a single reading
    ///
    /// Takes exactly the configured number of read attempts, sleeping the
    /// inter-sample delay after each one. This sleep is the cycle's only
    /// suspension point while a channel is being sampled.
    ///
    /// Returns `None` when every read attempt failed; the caller keeps the
    /// channel's last-known reading in that case.
    pub async fn aggregate(&self, channel: &mut dyn SensorChannel) -> Option<AggregatedReading> {
        let fields = channel.fields();
        let mut sums = vec![0.0f64; fields.len()];
        let mut successes = 0u32;

        for attempt in 1..=self.count {
            match channel.read().await {
                Some(sample) if sample.len() == fields.len() => {
                    for (sum, value) in sums.iter_mut().zip(&sample) {
                        *sum += value;
                    }
                    successes += 1;
                }
                Some(sample) => {
                    warn!(
                        "{}: read {} returned {} values, expected {}",
                        channel.label(),
                        attempt,
                        sample.len(),
                        fields.len()
                    );
                }
                None => {
                    warn!("{}: no data on read {}", channel.label(), attempt);
                }
            }
            sleep(self.delay).await;
        }

        if successes == 0 {
            warn!("{}: all {} reads failed", channel.label(), self.count);
            return None;
        }

        debug!(
            "{}: averaged {} of {} reads",
            channel.label(),
            successes,
            self.count
        );

        let values = fields
            .iter()
            .zip(sums)
            .map(|(field, sum)| {
                // Divide by the fixed attempt count even when reads failed
                (field.name, quantize(sum / self.count as f64, field.policy))
            })
            .collect();

        Some(AggregatedReading {
            channel: channel.label(),
            values,
        })
    }
}

/// Apply a quantization policy to an averaged value
pub fn quantize(value: f64, policy: Quantize) -> FieldValue {
    match policy {
        Quantize::Decimals(places) => FieldValue::Float(truncate_decimals(value, places)),
        Quantize::Raw => FieldValue::Float(value),
        Quantize::Count => FieldValue::Count(to_count(value)),
    }
}

/// Truncate toward zero to `places` decimal places
pub fn truncate_decimals(value: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places as i32);
    (value * scale).trunc() / scale
}

/// Round half away from zero and narrow to a 16-bit count, clamping instead
/// of wrapping out-of-range averages
fn to_count(value: f64) -> u16 {
    let rounded = value.round();
    if rounded < 0.0 {
        warn!("count average {value} below zero, clamping to 0");
        0
    } else if rounded > f64::from(u16::MAX) {
        warn!("count average {value} exceeds 16-bit range, clamping to {}", u16::MAX);
        u16::MAX
    } else {
        rounded as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingConfig;
    use crate::sensors::mocks::{ScriptedChannel, TEST_COUNT_FIELDS, TEST_FIELDS};

    fn aggregator(count: u32) -> SampleAggregator {
        SampleAggregator::new(&SamplingConfig {
            count,
            interval_ms: 500,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_reads_succeed() {
        // Scenario: all 10 temperature samples read 21.456
        let mut channel = ScriptedChannel::with_reads(TEST_FIELDS, vec![21.456], 10);

        let reading = aggregator(10).aggregate(&mut channel).await.unwrap();
        assert_eq!(reading.channel, "scripted");
        assert_eq!(reading.values, vec![("temperature", FieldValue::Float(21.45))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_divides_by_fixed_count() {
        // 5 successes at 10.0, 5 failures: mean is 50/10, not 50/5
        let mut channel = ScriptedChannel::new(TEST_FIELDS);
        for i in 0..10 {
            channel.script.push_back(if i % 2 == 0 { Some(vec![10.0]) } else { None });
        }

        let reading = aggregator(10).aggregate(&mut channel).await.unwrap();
        assert_eq!(reading.values, vec![("temperature", FieldValue::Float(5.0))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_reads_failed_surfaces_failure() {
        let mut channel = ScriptedChannel::new(TEST_FIELDS);
        for _ in 0..10 {
            channel.script.push_back(None);
        }

        assert!(aggregator(10).aggregate(&mut channel).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_arity_read_is_skipped() {
        let mut channel = ScriptedChannel::new(TEST_FIELDS);
        channel.script.push_back(Some(vec![10.0, 99.0]));
        channel.script.push_back(Some(vec![10.0]));

        let reading = aggregator(2).aggregate(&mut channel).await.unwrap();
        assert_eq!(reading.values, vec![("temperature", FieldValue::Float(5.0))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_count_rounds_half_up() {
        // Scenario: particle counts average 12.6 across 10 reads
        let mut channel = ScriptedChannel::with_reads(TEST_COUNT_FIELDS, vec![12.6], 10);

        let reading = aggregator(10).aggregate(&mut channel).await.unwrap();
        assert_eq!(reading.values, vec![("particles_03um", FieldValue::Count(13))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_count_reads_taken() {
        let mut channel = ScriptedChannel::with_reads(TEST_FIELDS, vec![1.0], 50);

        aggregator(10).aggregate(&mut channel).await.unwrap();
        // 50 scripted, 10 consumed
        assert_eq!(channel.script.len(), 40);
    }

    #[test]
    fn test_truncate_floors_toward_zero() {
        assert_eq!(truncate_decimals(21.456, 2), 21.45);
        assert_eq!(truncate_decimals(21.459, 2), 21.45);
        assert_eq!(truncate_decimals(-93.235499, 5), -93.23549);
        assert_eq!(truncate_decimals(44.974599, 5), 44.97459);
        assert_eq!(truncate_decimals(7.0, 0), 7.0);
    }

    #[test]
    fn test_quantization_is_idempotent() {
        let cases = [21.456, -93.235499, 0.0, 100.999];
        for value in cases {
            let once = truncate_decimals(value, 2);
            assert_eq!(truncate_decimals(once, 2), once);
        }

        // Count policy: re-quantizing the quantized value is a fixed point
        if let FieldValue::Count(c) = quantize(12.6, Quantize::Count) {
            assert_eq!(quantize(f64::from(c), Quantize::Count), FieldValue::Count(c));
        } else {
            panic!("expected a count");
        }

        assert_eq!(quantize(3.14159, Quantize::Raw), FieldValue::Float(3.14159));
    }

    #[test]
    fn test_count_clamps_instead_of_wrapping() {
        assert_eq!(quantize(70000.0, Quantize::Count), FieldValue::Count(65535));
        assert_eq!(quantize(-3.0, Quantize::Count), FieldValue::Count(0));
        assert_eq!(quantize(65535.4, Quantize::Count), FieldValue::Count(65535));
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(quantize(12.5, Quantize::Count), FieldValue::Count(13));
        assert_eq!(quantize(12.4, Quantize::Count), FieldValue::Count(12));
    }
}
