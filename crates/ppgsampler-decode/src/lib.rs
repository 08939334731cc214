//! Wire format of the sampler stream and host-side batch decoding.

pub mod batch;
pub mod line;
pub mod sample;

pub use batch::{Batch, BatchDecoder, BatchSummary, DecodeEvent};
pub use line::{Line, LineError, END_MARKER, START_MARKER};
pub use sample::Sample;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRate(pub f64); // Hz

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_s: f64,
    pub end_s: f64,
}

impl TimeSpan {
    pub fn duration_s(&self) -> f64 {
        self.end_s - self.start_s
    }
}
