//! Linux Industrial I/O ADC read through sysfs.

use crate::config::Resolution;
use crate::error::{Error, Result};
use crate::hal::{AnalogInput, Channel};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Reads `in_voltage<N>_raw` attributes of one IIO device, e.g.
/// `/sys/bus/iio/devices/iio:device0`.
#[derive(Debug, Clone)]
pub struct IioInput {
    channel_a: PathBuf,
    channel_b: PathBuf,
    resolution: Option<Resolution>,
}

impl IioInput {
    pub fn new(device: impl AsRef<Path>, index_a: u8, index_b: u8) -> Self {
        let device = device.as_ref();
        Self {
            channel_a: device.join(format!("in_voltage{index_a}_raw")),
            channel_b: device.join(format!("in_voltage{index_b}_raw")),
            resolution: None,
        }
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    fn path(&self, channel: Channel) -> &Path {
        match channel {
            Channel::A => &self.channel_a,
            Channel::B => &self.channel_b,
        }
    }
}

impl AnalogInput for IioInput {
    // sysfs ADCs convert at their native width; the setting is kept for
    // reference only.
    fn set_resolution(&mut self, resolution: Resolution) -> Result<()> {
        info!(
            "ADC resolution {} bits (max code {})",
            resolution.bits(),
            resolution.max_value()
        );
        for channel in Channel::ALL {
            debug!("channel {channel}: {}", self.path(channel).display());
        }
        self.resolution = Some(resolution);
        Ok(())
    }

    fn read(&mut self, channel: Channel) -> Result<u16> {
        let raw = fs::read_to_string(self.path(channel))?;
        let text = raw.trim();
        text.parse().map_err(|_| Error::AdcParse {
            channel,
            raw: text.to_string(),
        })
    }
}
