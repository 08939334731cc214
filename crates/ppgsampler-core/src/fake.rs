//! Scriptable stand-ins for the clock, the ADC and the output link.

use crate::config::Resolution;
use crate::error::{Error, Result};
use crate::hal::{AnalogInput, Channel, Clock, LineSink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Clock that only moves when told to, or when something delays on it.
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<Mutex<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: u64) -> Self {
        Self {
            now_ms: Arc::new(Mutex::new(ms)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.now_ms.lock() += duration.as_millis() as u64;
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        *self.now_ms.lock()
    }

    fn delay(&self, duration: Duration) {
        self.advance(duration);
    }
}

type ReadFn = Box<dyn FnMut(Channel) -> Result<u16>>;

/// Analog input driven by a closure, optionally charging clock time per read.
pub struct ScriptedInput {
    next: ReadFn,
    resolution: Option<Resolution>,
    reject_resolution: bool,
    read_cost: Option<(ManualClock, Duration)>,
    reads: u64,
}

impl ScriptedInput {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnMut(Channel) -> Result<u16> + 'static,
    {
        Self {
            next: Box::new(f),
            resolution: None,
            reject_resolution: false,
            read_cost: None,
            reads: 0,
        }
    }

    pub fn constant(a: u16, b: u16) -> Self {
        Self::from_fn(move |channel| {
            Ok(match channel {
                Channel::A => a,
                Channel::B => b,
            })
        })
    }

    /// Every read advances `clock` by `cost`, to model conversion time.
    pub fn with_read_cost(mut self, clock: &ManualClock, cost: Duration) -> Self {
        self.read_cost = Some((clock.clone(), cost));
        self
    }

    /// Makes `set_resolution` fail, like an ADC without that bit width.
    pub fn reject_resolution(mut self) -> Self {
        self.reject_resolution = true;
        self
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl AnalogInput for ScriptedInput {
    fn set_resolution(&mut self, resolution: Resolution) -> Result<()> {
        if self.reject_resolution {
            return Err(Error::InvalidResolution(resolution.bits()));
        }
        self.resolution = Some(resolution);
        Ok(())
    }

    fn read(&mut self, channel: Channel) -> Result<u16> {
        if let Some((clock, cost)) = &self.read_cost {
            clock.advance(*cost);
        }
        self.reads += 1;
        (self.next)(channel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenLine {
    /// Clock time of the write, when the sink was given a clock.
    pub at_ms: Option<u64>,
    pub text: String,
}

/// In-memory link. Clones share the captured lines.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<WrittenLine>>>,
    clock: Option<ManualClock>,
    not_ready_polls: u32,
    polls: u32,
    write_limit: Option<usize>,
    fail_at: Option<usize>,
    attempts: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps every write with `clock`'s time.
    pub fn with_clock(mut self, clock: &ManualClock) -> Self {
        self.clock = Some(clock.clone());
        self
    }

    /// Reports not ready for the first `polls` calls to `is_ready`.
    pub fn ready_after(mut self, polls: u32) -> Self {
        self.not_ready_polls = polls;
        self
    }

    /// Accepts `count` lines, then fails every write with a broken pipe.
    pub fn fail_after(mut self, count: usize) -> Self {
        self.write_limit = Some(count);
        self
    }

    /// Fails only the write attempt numbered `attempt` (from 0) with a
    /// timeout. Later writes succeed again.
    pub fn fail_once_at(mut self, attempt: usize) -> Self {
        self.fail_at = Some(attempt);
        self
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn lines(&self) -> Vec<WrittenLine> {
        self.lines.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines.lock().iter().map(|l| l.text.clone()).collect()
    }
}

impl LineSink for MemorySink {
    fn is_ready(&mut self) -> bool {
        self.polls += 1;
        self.polls > self.not_ready_polls
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.fail_at == Some(attempt) {
            return Err(Error::Io(std::io::ErrorKind::TimedOut.into()));
        }
        let mut lines = self.lines.lock();
        if self.write_limit.is_some_and(|limit| lines.len() >= limit) {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        lines.push(WrittenLine {
            at_ms: self.clock.as_ref().map(Clock::millis),
            text: line.to_string(),
        });
        Ok(())
    }
}
