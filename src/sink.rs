//! Record output.
//!
//! Records stream to the sink as they are extracted, so a run interrupted
//! midway still leaves everything scraped so far on disk. JSON Lines is the
//! only built-in format; the trait seam exists so a different store can be
//! dropped in without touching the pipeline.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ScrapeError;
use crate::models::ListingRecord;

/// Destination for extracted records.
pub trait RecordSink {
    fn write(&mut self, record: &ListingRecord) -> Result<(), ScrapeError>;
    fn flush(&mut self) -> Result<(), ScrapeError>;
}

/// One JSON object per line, appended in extraction order.
pub struct JsonLinesSink {
    writer: BufWriter<File>,
    path: PathBuf,
    written: usize,
}

impl JsonLinesSink {
    /// Create (or truncate) the output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ScrapeError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonLinesSink {
    fn write(&mut self, record: &ListingRecord) -> Result<(), ScrapeError> {
        let line = serde_json::to_string(record)
            .map_err(|e| ScrapeError::Parse(format!("record serialization: {e}")))?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ScrapeError> {
        self.writer.flush()?;
        info!(records = self.written, path = %self.path.display(), "output flushed");
        Ok(())
    }
}

/// Test sink that keeps records in memory.
#[derive(Default)]
pub struct MemorySink {
    pub records: Vec<ListingRecord>,
}

impl RecordSink for MemorySink {
    fn write(&mut self, record: &ListingRecord) -> Result<(), ScrapeError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ScrapeError> {
        Ok(())
    }
}
