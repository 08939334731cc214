pub const DEFAULT_MAX_LINE: usize = 1024;

/// Reassembles serial read chunks into text lines.
///
/// Chunks arrive split at arbitrary byte boundaries, and a gap between two
/// chunks says nothing about where a line ends. Complete lines are returned
/// without their `\r\n`. A partial line is only returned as-is when it
/// grows past `max_line` bytes or when the stream is finished.
pub struct LineAssembler {
    buf: Vec<u8>,
    max_line: usize,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

impl LineAssembler {
    pub fn new(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_line,
        }
    }

    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        self.buf.extend_from_slice(data);
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(to_text(&line));
        }

        if self.buf.len() > self.max_line {
            lines.push(to_text(&std::mem::take(&mut self.buf)));
        }
        lines
    }

    /// Returns whatever partial line is left, e.g. when the port closes.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        Some(to_text(&std::mem::take(&mut self.buf)))
    }
}

/// The stream is ASCII; anything else is shown as `?`.
fn to_text(bytes: &[u8]) -> String {
    let trimmed = bytes
        .strip_suffix(b"\n")
        .map(|b| b.strip_suffix(b"\r").unwrap_or(b))
        .unwrap_or(bytes);
    trimmed
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}
