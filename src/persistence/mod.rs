//! Result sink for execution runs and reports.
//!
//! Runs are written to a checksummed binary container so raw results can be
//! re-graded later without re-querying the store. Reports are also written
//! as pretty JSON for humans and plotting scripts.
//!
//! # File Format
//!
//! ```text
//! [MAGIC 8B "RNGBNCH\0"][VERSION u32][PAYLOAD_KIND u32][FLAGS u32][CHECKSUM u32]
//! [PAYLOAD bincode]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use range_bench::persistence::Persistable;
//!
//! run.save("results/index-scan.rbr")?;
//! let loaded = ExecutionRun::load("results/index-scan.rbr")?;
//! ```

mod format;

pub use format::{FileHeader, PayloadKind, FORMAT_VERSION, MAGIC};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{RangeBenchError, Result};
use crate::evaluation::RecallReport;
use crate::executor::ExecutionRun;

/// Trait for result types that can be written to and read from disk.
pub trait Persistable: Sized {
    /// Save to a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written or serialization fails.
    fn save(&self, path: impl AsRef<Path>) -> Result<()>;

    /// Load from a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is corrupted, or has an
    /// incompatible format.
    fn load(path: impl AsRef<Path>) -> Result<Self>;
}

impl Persistable for ExecutionRun {
    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_with_header(path, PayloadKind::ExecutionRun, &bincode::serialize(self)?)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        let payload = verify_header(&data, PayloadKind::ExecutionRun)?;
        Ok(bincode::deserialize(payload)?)
    }
}

impl Persistable for RecallReport {
    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_with_header(path, PayloadKind::RecallReport, &bincode::serialize(self)?)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        let payload = verify_header(&data, PayloadKind::RecallReport)?;
        Ok(bincode::deserialize(payload)?)
    }
}

/// Save an execution run in the checksummed binary container.
pub fn save_run(path: impl AsRef<Path>, run: &ExecutionRun) -> Result<()> {
    run.save(path)
}

/// Load an execution run written by [`save_run`].
pub fn load_run(path: impl AsRef<Path>) -> Result<ExecutionRun> {
    ExecutionRun::load(path)
}

/// Write a report (or any serializable outcome) as pretty JSON.
pub fn save_report_json<T: Serialize>(path: impl AsRef<Path>, report: &T) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!(path = %path.display(), "wrote json report");
    Ok(())
}

/// Read a report written by [`save_report_json`].
pub fn load_report_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let data = std::fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Verify file header and return the payload.
pub(crate) fn verify_header(data: &[u8], expected: PayloadKind) -> Result<&[u8]> {
    if data.len() < FileHeader::SIZE {
        return Err(RangeBenchError::format("file too small for header"));
    }

    let header = FileHeader::from_bytes(&data[..FileHeader::SIZE])?;
    header.verify(expected)?;

    let payload = &data[FileHeader::SIZE..];
    if crc32fast::hash(payload) != header.checksum {
        return Err(RangeBenchError::ChecksumMismatch);
    }

    Ok(payload)
}

/// Write header and payload to file.
pub(crate) fn write_with_header(
    path: impl AsRef<Path>,
    kind: PayloadKind,
    payload: &[u8],
) -> Result<()> {
    let path = path.as_ref();
    let header = FileHeader::new(kind, crc32fast::hash(payload));

    let mut file = File::create(path)?;
    file.write_all(&header.to_bytes())?;
    file.write_all(payload)?;
    file.sync_all()?;

    debug!(path = %path.display(), ?kind, bytes = payload.len(), "wrote result file");
    Ok(())
}
