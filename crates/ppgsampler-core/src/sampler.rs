//! The duty-cycled sampling loop.
//!
//! One cycle is a collection phase, where both channels are read every
//! `sample_period` and streamed as `<elapsed_ms>,<a>,<b>` lines between a
//! start and an end marker, followed by an idle phase that writes nothing.
//! Both phases use plain fixed delays, so per-sample work stretches the
//! real period and lowers the sample count below the nominal bound.

use crate::config::SamplerConfig;
use crate::error::Result;
use crate::hal::{AnalogInput, Channel, Clock, LineSink};
use log::{debug, info, warn};
use ppgsampler_decode::{Sample, END_MARKER, START_MARKER};
use std::convert::Infallible;
use std::time::Duration;

pub const BANNER_TITLE: &str = "PPG PTT Data Collection System";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Collecting,
    Idle,
}

/// Outcome of [`Sampler::wait_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyWait {
    pub waited: Duration,
    /// Stall warnings logged while waiting. At most one.
    pub warnings: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub index: u64,
    pub samples: u64,
    /// Clock time spent between the start and end markers.
    pub collection_elapsed: Duration,
}

pub struct Sampler<A, C, S> {
    input: A,
    clock: C,
    sink: S,
    config: SamplerConfig,
    phase: Phase,
    cycles: u64,
}

impl<A: AnalogInput, C: Clock, S: LineSink> Sampler<A, C, S> {
    pub fn new(input: A, clock: C, sink: S, config: SamplerConfig) -> Self {
        Self {
            input,
            clock,
            sink,
            config,
            phase: Phase::Collecting,
            cycles: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn input(&self) -> &A {
        &self.input
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Waits for the link, configures the ADC and prints the banner.
    ///
    /// Only an ADC that rejects the resolution is an error. A banner the
    /// link drops is logged and sampling starts anyway.
    pub fn start(&mut self) -> Result<()> {
        self.wait_ready();
        self.input.set_resolution(self.config.resolution)?;
        info!(
            "sampling every {:?} for {:?}, idle {:?}, {}-bit ADC",
            self.config.sample_period,
            self.config.collection_time,
            self.config.wait_time,
            self.config.resolution.bits()
        );
        if let Err(e) = self.write_banner() {
            warn!("banner not sent: {e}");
        }
        Ok(())
    }

    fn write_banner(&mut self) -> Result<()> {
        self.sink.write_line(BANNER_TITLE)?;
        self.sink.write_line(&self.config.banner())
    }

    /// Blocks until the sink reports ready. Never gives up; a stalled link
    /// is reported once in the log and the wait continues.
    pub fn wait_ready(&mut self) -> ReadyWait {
        let since = self.clock.millis();
        let mut warnings = 0;
        while !self.sink.is_ready() {
            if let Some(limit) = self.config.ready_warn_after {
                let waited = Duration::from_millis(self.clock.millis().saturating_sub(since));
                if warnings == 0 && waited >= limit {
                    warn!("output link still not ready after {waited:?}, waiting");
                    warnings += 1;
                }
            }
            self.clock.delay(self.config.ready_poll);
        }
        debug!("output link ready");
        ReadyWait {
            waited: Duration::from_millis(self.clock.millis().saturating_sub(since)),
            warnings,
        }
    }

    /// Runs one collection phase and returns the number of samples sent.
    pub fn collect(&mut self) -> Result<u64> {
        self.phase = Phase::Collecting;
        self.sink.write_line(START_MARKER)?;

        let start = self.clock.millis();
        let end = start + self.config.collection_time.as_millis() as u64;
        let mut samples = 0;
        loop {
            let now = self.clock.millis();
            if now >= end {
                break;
            }
            let sample = Sample {
                elapsed_ms: now - start,
                channel_a: self.input.read(Channel::A)?,
                channel_b: self.input.read(Channel::B)?,
            };
            self.sink.write_line(&sample.to_string())?;
            samples += 1;
            self.clock.delay(self.config.sample_period);
        }

        self.sink.write_line(END_MARKER)?;
        Ok(samples)
    }

    /// Sleeps through the idle phase without writing anything. The phase
    /// stays `Idle` until the next collection starts.
    pub fn idle(&mut self) {
        self.phase = Phase::Idle;
        debug!("idle for {:?}", self.config.wait_time);
        self.clock.delay(self.config.wait_time);
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let index = self.cycles;
        self.cycles += 1;
        let started = self.clock.millis();
        let samples = self.collect()?;
        let collection_elapsed = Duration::from_millis(self.clock.millis() - started);

        let nominal = self.config.max_samples_per_phase();
        info!("cycle {index}: {samples}/{nominal} samples in {collection_elapsed:?}");
        if samples < nominal {
            debug!("cycle {index}: {} samples lost to per-sample overhead", nominal - samples);
        }

        self.idle();
        Ok(CycleReport {
            index,
            samples,
            collection_elapsed,
        })
    }

    /// Runs one cycle. A failed cycle counts as a lost link and returns
    /// `None` after the idle phase and a fresh wait for the link.
    pub fn cycle_or_recover(&mut self) -> Option<CycleReport> {
        match self.run_cycle() {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("cycle {} failed: {e}", self.cycles - 1);
                self.idle();
                self.wait_ready();
                None
            }
        }
    }

    /// Starts up and cycles forever. Returns only when startup fails.
    pub fn run(mut self) -> Result<Infallible> {
        self.start()?;
        loop {
            self.cycle_or_recover();
        }
    }
}
