//! Seams between the sampling loop and the hardware it drives.

use crate::config::Resolution;
use crate::error::Result;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::A => "A",
            Channel::B => "B",
        })
    }
}

/// Two-channel analog front end.
pub trait AnalogInput {
    /// Applied once at startup.
    fn set_resolution(&mut self, resolution: Resolution) -> Result<()>;

    /// Raw converter code. Values are passed through as read, with no
    /// range check against the configured resolution.
    fn read(&mut self, channel: Channel) -> Result<u16>;
}

/// Monotonic millisecond clock with a blocking delay.
pub trait Clock {
    fn millis(&self) -> u64;
    fn delay(&self, duration: Duration);
}

/// Line-oriented output link.
pub trait LineSink {
    /// Whether the peer is attached and writes will be delivered.
    fn is_ready(&mut self) -> bool;

    /// Writes `line` followed by the link's line ending.
    fn write_line(&mut self, line: &str) -> Result<()>;
}
