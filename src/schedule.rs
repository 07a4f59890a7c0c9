//! # Duty-Cycle Scheduler
//!
//! Decides when the next acquisition-and-report cycle begins.
//!
//! Two policies are supported. `elapsed` sleeps a fixed period between cycles
//! with no drift correction, so each cycle lasts the period plus the previous
//! cycle's work time. `aligned` asks the gateway for the absolute UTC clock
//! and sleeps to the next period boundary, so reports land on :00/:15/:30/:45
//! regardless of cycle-to-cycle jitter.
//!
//! The original firmware spun the CPU for these waits; a real sleep replaces
//! the spinning while keeping the blocking contract: nothing else runs during
//! the wait and the wait cannot be interrupted.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{ScheduleConfig, SchedulePolicy};
use crate::transport::Gateway;

/// Cadence/alignment scheduler for the duty cycle
pub struct DutyCycleScheduler {
    policy: SchedulePolicy,
    period_s: u64,
    retry_delay: Duration,
}

impl DutyCycleScheduler {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            policy: config.policy,
            period_s: config.period_s,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Block until the next cycle boundary
    ///
    /// Under the aligned policy a failed clock fetch never blocks forever:
    /// the failure is logged, the scheduler pauses briefly, and the whole
    /// decision is retried rather than proceeding on stale or zero time.
    pub async fn wait_for_next_cycle(&self, gateway: &mut dyn Gateway) {
        match self.policy {
            SchedulePolicy::Elapsed => {
                info!("Waiting {} s until the next cycle", self.period_s);
                sleep(Duration::from_secs(self.period_s)).await;
            }
            SchedulePolicy::Aligned => loop {
                match gateway.clock_time().await {
                    Ok(now) => {
                        let wait = aligned_wait_secs(self.period_s, now);
                        info!("Waiting {wait} s until the next {}-s boundary", self.period_s);
                        sleep(Duration::from_secs(wait)).await;
                        return;
                    }
                    Err(e) => {
                        warn!("Failed to get gateway time, retrying: {e}");
                        sleep(self.retry_delay).await;
                    }
                }
            },
        }
    }
}

/// Seconds from gateway time `now` to the next period boundary
///
/// The literal formula is kept from the deployed firmware: when `now` falls
/// exactly on a boundary the wait is a full period, aligning the cycle to the
/// following boundary instead of firing immediately.
pub fn aligned_wait_secs(period_s: u64, now: u64) -> u64 {
    period_s - (now % period_s)
}
