use crate::sample::Sample;
use std::fmt;
use thiserror::Error;

pub const START_MARKER: &str = "START_DATA_COLLECTION";
pub const END_MARKER: &str = "END_DATA_COLLECTION";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),
    #[error("field {index} is not a decimal integer: {field:?}")]
    BadField { index: usize, field: String },
    #[error("field {index} out of range: {field}")]
    OutOfRange { index: usize, field: String },
}

/// Every line form the sampler emits on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Start,
    End,
    Data(Sample),
}

impl Line {
    /// Parses one line. A trailing `\n` or `\r\n` is tolerated, anything
    /// else must match the wire form exactly.
    pub fn parse(raw: &str) -> Result<Self, LineError> {
        let text = raw.trim_end_matches(['\r', '\n']);
        match text {
            START_MARKER => Ok(Self::Start),
            END_MARKER => Ok(Self::End),
            _ => text.parse().map(Self::Data),
        }
    }

    pub fn is_marker(&self) -> bool {
        !matches!(self, Self::Data(_))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str(START_MARKER),
            Self::End => f.write_str(END_MARKER),
            Self::Data(sample) => fmt::Display::fmt(sample, f),
        }
    }
}
