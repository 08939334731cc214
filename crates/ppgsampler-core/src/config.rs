//! Build-time configuration. Nothing here is read at runtime.

use crate::error::{Error, Result};
use std::time::Duration;

/// Sample every 10 ms (100 Hz nominal).
pub const SAMPLE_PERIOD_MS: u64 = 10;
/// Length of the active sampling phase.
pub const COLLECTION_TIME_MS: u64 = 10_000;
/// Idle time, chosen so a full cycle takes one minute.
pub const WAIT_TIME_MS: u64 = 50_000;
pub const ADC_RESOLUTION_BITS: u8 = 12;
pub const BAUD_RATE: u32 = 115_200;

/// Poll interval of the startup link gate.
pub const READY_POLL_MS: u64 = 10;
/// Warn once if the link is still not ready after this long.
pub const READY_WARN_AFTER_MS: u64 = 5_000;

/// ADC conversion width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution(u8);

impl Resolution {
    pub const MAX_BITS: u8 = 16;

    pub fn new(bits: u8) -> Result<Self> {
        if bits == 0 || bits > Self::MAX_BITS {
            return Err(Error::InvalidResolution(bits));
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Largest code the converter can produce, e.g. 4095 at 12 bits.
    pub fn max_value(&self) -> u16 {
        (((1u32) << self.0) - 1) as u16
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self(ADC_RESOLUTION_BITS)
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub sample_period: Duration,
    pub collection_time: Duration,
    pub wait_time: Duration,
    pub resolution: Resolution,
    pub ready_poll: Duration,
    pub ready_warn_after: Option<Duration>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_millis(SAMPLE_PERIOD_MS),
            collection_time: Duration::from_millis(COLLECTION_TIME_MS),
            wait_time: Duration::from_millis(WAIT_TIME_MS),
            resolution: Resolution::default(),
            ready_poll: Duration::from_millis(READY_POLL_MS),
            ready_warn_after: Some(Duration::from_millis(READY_WARN_AFTER_MS)),
        }
    }
}

impl SamplerConfig {
    pub fn cycle_time(&self) -> Duration {
        self.collection_time + self.wait_time
    }

    /// Upper bound on data lines per collection phase. Reached only when
    /// reading and writing take no time at all.
    pub fn max_samples_per_phase(&self) -> u64 {
        let period = self.sample_period.as_millis().max(1) as u64;
        (self.collection_time.as_millis() as u64).div_ceil(period)
    }

    /// Second banner line, e.g. "Collecting data for 10 seconds every minute".
    pub fn banner(&self) -> String {
        let collect_s = self.collection_time.as_secs();
        let cycle_s = self.cycle_time().as_secs();
        let every = match cycle_s {
            60 => "every minute".to_string(),
            s if s >= 120 && s % 60 == 0 => format!("every {} minutes", s / 60),
            s => format!("every {s} seconds"),
        };
        format!("Collecting data for {collect_s} seconds {every}")
    }
}
