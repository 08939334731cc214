use crate::line::LineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One reading from each analog channel, stamped with the time since the
/// current collection phase began.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub elapsed_ms: u64,
    pub channel_a: u16,
    pub channel_b: u16,
}

impl Sample {
    pub const FIELD_SEPARATOR: char = ',';

    pub fn new(elapsed_ms: u64, channel_a: u16, channel_b: u16) -> Self {
        Self { elapsed_ms, channel_a, channel_b }
    }
}

/// Wire form: `<elapsed_ms>,<channel_a>,<channel_b>`.
impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.elapsed_ms, self.channel_a, self.channel_b)
    }
}

impl FromStr for Sample {
    type Err = LineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(Self::FIELD_SEPARATOR).collect();
        if fields.len() != 3 {
            return Err(LineError::FieldCount(fields.len()));
        }

        Ok(Self {
            elapsed_ms: parse_field(fields[0], 0)?,
            channel_a: parse_field(fields[1], 1)?,
            channel_b: parse_field(fields[2], 2)?,
        })
    }
}

/// Accepts only plain ASCII decimal with no sign, whitespace or leading zeros.
fn parse_field<T: FromStr>(field: &str, index: usize) -> Result<T, LineError> {
    let canonical = !field.is_empty()
        && field.bytes().all(|b| b.is_ascii_digit())
        && (field == "0" || !field.starts_with('0'));
    if !canonical {
        return Err(LineError::BadField { index, field: field.to_string() });
    }
    field
        .parse()
        .map_err(|_| LineError::OutOfRange { index, field: field.to_string() })
}
