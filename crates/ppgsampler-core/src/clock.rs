use crate::hal::Clock;
use std::time::{Duration, Instant};

/// Wall-clock implementation backed by [`Instant`], counting from creation.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
