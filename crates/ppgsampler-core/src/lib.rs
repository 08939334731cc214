//! Core functionalities: sampling loop, hardware seams, serial I/O.

pub mod clock;
pub mod config;
pub mod error;
pub mod fake;
pub mod hal;
pub mod iio;
pub mod linebuf;
pub mod sampler;
pub mod serial_service;

pub use clock::MonotonicClock;
pub use config::{Resolution, SamplerConfig};
pub use error::{Error, Result};
pub use hal::{AnalogInput, Channel, Clock, LineSink};
pub use iio::IioInput;
pub use linebuf::LineAssembler;
pub use sampler::{CycleReport, Phase, ReadyWait, Sampler};
pub use serial_service::{LineEnding, PortInfo, SerialConfig, SerialEvent, SerialLink, SerialService};
