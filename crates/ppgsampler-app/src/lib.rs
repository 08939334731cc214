//! Shared pieces of the `ppg-sampler` and `ppg-capture` binaries.

pub mod capture;
pub mod logging;
