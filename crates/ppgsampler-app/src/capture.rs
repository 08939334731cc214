//! Host side of the link: turns the raw serial stream into one CSV file per
//! collection phase plus a JSON-lines index of what was saved.

use anyhow::{Context, Result};
use ppgsampler_core::LineAssembler;
use ppgsampler_decode::{Batch, BatchDecoder, BatchSummary, DecodeEvent};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

pub const INDEX_FILE: &str = "sessions.jsonl";

#[derive(Debug, Serialize)]
struct IndexRecord<'a> {
    session: &'a str,
    file: String,
    #[serde(flatten)]
    summary: BatchSummary,
}

pub struct CaptureSession {
    dir: PathBuf,
    name: String,
    assembler: LineAssembler,
    decoder: BatchDecoder,
    index: File,
    saved: u64,
}

impl CaptureSession {
    /// Starts a session named after the current Unix time in milliseconds,
    /// with a numeric suffix if files under that name already exist.
    pub fn create(dir: &Path) -> Result<Self> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let name = unused_name(dir, &format!("session_{millis}"))?;
        Self::with_name(dir, &name)
    }

    pub fn with_name(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let index_path = dir.join(INDEX_FILE);
        let index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&index_path)
            .with_context(|| format!("opening {}", index_path.display()))?;
        info!("capturing into {} as {name}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
            assembler: LineAssembler::default(),
            decoder: BatchDecoder::new(),
            index,
            saved: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn saved(&self) -> u64 {
        self.saved
    }

    /// Feeds one raw read from the port. Returns the CSV files written.
    pub fn ingest(&mut self, chunk: &[u8]) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for line in self.assembler.push(chunk) {
            written.extend(self.ingest_line(&line)?);
        }
        Ok(written)
    }

    pub fn ingest_line(&mut self, line: &str) -> Result<Option<PathBuf>> {
        let Some(event) = self.decoder.feed(line) else {
            return Ok(None);
        };
        match event {
            DecodeEvent::Started(index) => {
                info!("collection {index} started");
                Ok(None)
            }
            DecodeEvent::Completed(batch) if batch.is_empty() => {
                warn!("collection {} ended without samples", batch.index);
                Ok(None)
            }
            DecodeEvent::Completed(batch) => self.save(&batch).map(Some),
            DecodeEvent::Aborted(batch) => {
                warn!(
                    "collection {} restarted after {} samples, discarded",
                    batch.index,
                    batch.len()
                );
                Ok(None)
            }
            DecodeEvent::Malformed { line, error } => {
                debug!("skipping {line:?} [{}]: {error}", hex::encode(line.as_bytes()));
                Ok(None)
            }
            DecodeEvent::Ignored(text) => {
                info!("device: {text}");
                Ok(None)
            }
        }
    }

    fn save(&mut self, batch: &Batch) -> Result<PathBuf> {
        let file_name = format!("{}_collection_{:04}_raw_data.csv", self.name, batch.index);
        let path = self.dir.join(&file_name);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        batch.write_csv(BufWriter::new(file))?;

        let summary = batch.summary();
        if !summary.monotonic {
            warn!("collection {}: timestamps go backwards", batch.index);
        }
        if summary.malformed > 0 {
            warn!("collection {}: {} malformed lines skipped", batch.index, summary.malformed);
        }
        let record = IndexRecord {
            session: &self.name,
            file: file_name,
            summary,
        };
        serde_json::to_writer(&mut self.index, &record)?;
        self.index.write_all(b"\n")?;
        self.index.flush()?;

        self.saved += 1;
        info!(
            "collection {}: {} samples saved to {}",
            batch.index,
            batch.len(),
            path.display()
        );
        Ok(path)
    }

    /// Flushes a trailing partial line and reports a batch cut off by the
    /// end of the stream. Returns the number of files saved.
    pub fn finish(mut self) -> Result<u64> {
        if let Some(line) = self.assembler.finish() {
            self.ingest_line(&line)?;
        }
        if let Some(open) = self.decoder.take_open() {
            warn!(
                "stream ended inside collection {} ({} samples), not saved",
                open.index,
                open.len()
            );
        }
        Ok(self.saved)
    }
}

/// `base`, or `base_<n>` for the first `n` that no file in `dir` uses.
fn unused_name(dir: &Path, base: &str) -> Result<String> {
    let taken: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
    };
    let in_use = |name: &str| {
        let prefix = format!("{name}_collection_");
        taken.iter().any(|file| file.starts_with(&prefix))
    };

    let mut name = base.to_string();
    let mut n = 0;
    while in_use(&name) {
        n += 1;
        name = format!("{base}_{n}");
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_completed_batches_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = CaptureSession::with_name(dir.path(), "t").unwrap();

        let written = session
            .ingest(b"banner\r\nSTART_DATA_COLLECTION\r\n0,1,2\r\n10,3,4\r\nEND_DATA_COLLECTION\r\nSTART_DATA_")
            .unwrap();
        assert_eq!(written, vec![dir.path().join("t_collection_0000_raw_data.csv")]);
        assert_eq!(
            fs::read_to_string(&written[0]).unwrap(),
            "timestamp_ms,ppg1,ppg2\n0,1,2\n10,3,4\n"
        );

        session.ingest(b"COLLECTION\r\n0,5,6\r\n").unwrap();
        assert_eq!(session.finish().unwrap(), 1);
        assert!(!dir.path().join("t_collection_0001_raw_data.csv").exists());
    }

    #[test]
    fn empty_batch_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = CaptureSession::with_name(dir.path(), "t").unwrap();

        let written = session
            .ingest(b"START_DATA_COLLECTION\nEND_DATA_COLLECTION\n")
            .unwrap();
        assert!(written.is_empty());
        assert_eq!(session.saved(), 0);
    }

    #[test]
    fn sessions_in_one_directory_get_their_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let batch = b"START_DATA_COLLECTION\n0,1,2\nEND_DATA_COLLECTION\n";

        let mut first = CaptureSession::create(dir.path()).unwrap();
        let first_csv = first.ingest(batch).unwrap();
        let mut second = CaptureSession::create(dir.path()).unwrap();
        let second_csv = second.ingest(batch).unwrap();

        assert_ne!(first.name(), second.name());
        assert_eq!(first_csv.len(), 1);
        assert_eq!(second_csv.len(), 1);
        assert_ne!(first_csv, second_csv);
    }

    #[test]
    fn taken_name_gets_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("s_collection_0000_raw_data.csv"), "").unwrap();
        fs::write(dir.path().join("s_1_collection_0000_raw_data.csv"), "").unwrap();

        assert_eq!(unused_name(dir.path(), "s").unwrap(), "s_2");
        assert_eq!(unused_name(dir.path(), "other").unwrap(), "other");
        assert_eq!(unused_name(&dir.path().join("new"), "s").unwrap(), "s");
    }

    #[test]
    fn existing_csv_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t_collection_0000_raw_data.csv");
        fs::write(&path, "kept").unwrap();

        let mut session = CaptureSession::with_name(dir.path(), "t").unwrap();
        assert!(session
            .ingest(b"START_DATA_COLLECTION\n0,1,2\nEND_DATA_COLLECTION\n")
            .is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "kept");
    }

    #[test]
    fn delayed_tail_of_a_line_is_not_saved_as_a_sample() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = CaptureSession::with_name(dir.path(), "t").unwrap();

        session.ingest(b"START_DATA_COLLECTION\n1220,100,200\n12").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(150));
        let written = session.ingest(b"30,100,200\nEND_DATA_COLLECTION\n").unwrap();

        assert_eq!(
            fs::read_to_string(&written[0]).unwrap(),
            "timestamp_ms,ppg1,ppg2\n1220,100,200\n1230,100,200\n"
        );
    }
}
