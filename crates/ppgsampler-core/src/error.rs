use crate::hal::Channel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unsupported ADC resolution: {0} bits")]
    InvalidResolution(u8),
    #[error("channel {channel}: unreadable ADC value {raw:?}")]
    AdcParse { channel: Channel, raw: String },
}

pub type Result<T> = std::result::Result<T, Error>;
