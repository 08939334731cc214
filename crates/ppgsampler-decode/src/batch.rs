use crate::line::{Line, LineError};
use crate::sample::Sample;
use crate::{SampleRate, TimeSpan};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

pub const CSV_HEADER: &str = "timestamp_ms,ppg1,ppg2";

/// Samples received between one start marker and the matching end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: u64,
    pub samples: Vec<Sample>,
    /// Lines inside the batch that failed to parse and were skipped.
    pub malformed: usize,
}

impl Batch {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            samples: Vec::new(),
            malformed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn span(&self) -> Option<TimeSpan> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        Some(TimeSpan {
            start_s: first.elapsed_ms as f64 / 1000.0,
            end_s: last.elapsed_ms as f64 / 1000.0,
        })
    }

    /// Mean rate over the batch, `None` with fewer than two samples or a
    /// zero-length span.
    pub fn achieved_rate(&self) -> Option<SampleRate> {
        let span = self.span()?;
        let duration = span.duration_s();
        if self.samples.len() < 2 || duration <= 0.0 {
            return None;
        }
        Some(SampleRate((self.samples.len() - 1) as f64 / duration))
    }

    pub fn is_monotonic(&self) -> bool {
        self.samples
            .windows(2)
            .all(|pair| pair[0].elapsed_ms <= pair[1].elapsed_ms)
    }

    pub fn write_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{CSV_HEADER}")?;
        for sample in &self.samples {
            writeln!(writer, "{sample}")?;
        }
        writer.flush()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            index: self.index,
            samples: self.samples.len(),
            malformed: self.malformed,
            span: self.span(),
            rate: self.achieved_rate(),
            monotonic: self.is_monotonic(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub index: u64,
    pub samples: usize,
    pub malformed: usize,
    pub span: Option<TimeSpan>,
    pub rate: Option<SampleRate>,
    pub monotonic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    Started(u64),
    Completed(Batch),
    /// A start marker arrived while a batch was still open; the open batch
    /// is dropped and a new one begins.
    Aborted(Batch),
    Malformed { line: String, error: LineError },
    /// Text outside a batch (banner, stray data, unmatched end marker).
    Ignored(String),
}

/// Splits a line stream into batches delimited by the start/end markers.
#[derive(Debug, Default)]
pub struct BatchDecoder {
    open: Option<Batch>,
    next_index: u64,
}

impl BatchDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collecting(&self) -> bool {
        self.open.is_some()
    }

    /// Feeds one line. Data lines accumulate silently and return `None`.
    pub fn feed(&mut self, raw: &str) -> Option<DecodeEvent> {
        let text = raw.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            return None;
        }

        match Line::parse(text) {
            Ok(Line::Start) => {
                let index = self.next_index;
                self.next_index += 1;
                match self.open.replace(Batch::new(index)) {
                    Some(stale) => Some(DecodeEvent::Aborted(stale)),
                    None => Some(DecodeEvent::Started(index)),
                }
            }
            Ok(Line::End) => match self.open.take() {
                Some(batch) => Some(DecodeEvent::Completed(batch)),
                None => Some(DecodeEvent::Ignored(text.to_string())),
            },
            Ok(Line::Data(sample)) => match self.open.as_mut() {
                Some(batch) => {
                    batch.samples.push(sample);
                    None
                }
                None => Some(DecodeEvent::Ignored(text.to_string())),
            },
            Err(error) => match self.open.as_mut() {
                Some(batch) => {
                    batch.malformed += 1;
                    Some(DecodeEvent::Malformed {
                        line: text.to_string(),
                        error,
                    })
                }
                None => Some(DecodeEvent::Ignored(text.to_string())),
            },
        }
    }

    /// Hands back a batch left open when the stream ended.
    pub fn take_open(&mut self) -> Option<Batch> {
        self.open.take()
    }
}
