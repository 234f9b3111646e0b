//! File format definitions for benchmark result files.

use crate::error::{RangeBenchError, Result};

/// Magic bytes identifying a range-bench result file: "RNGBNCH\0"
pub const MAGIC: [u8; 8] = *b"RNGBNCH\0";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Payload type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PayloadKind {
    /// An execution run (records plus wall-clock span).
    ExecutionRun = 1,
    /// A recall report.
    RecallReport = 2,
}

impl PayloadKind {
    /// Convert from u32.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::ExecutionRun),
            2 => Some(Self::RecallReport),
            _ => None,
        }
    }
}

/// File header structure.
///
/// Total size: 24 bytes
/// ```text
/// [MAGIC 8B][VERSION u32][PAYLOAD_KIND u32][FLAGS u32][CHECKSUM u32]
/// ```
#[derive(Debug, Clone)]
pub struct FileHeader {
    /// Magic bytes (must be MAGIC)
    pub magic: [u8; 8],
    /// Format version
    pub version: u32,
    /// Payload type
    pub kind: PayloadKind,
    /// Reserved, written as zero
    pub flags: u32,
    /// CRC32 checksum of the payload (everything after header)
    pub checksum: u32,
}

impl FileHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 24;

    /// Create a new header.
    pub fn new(kind: PayloadKind, checksum: u32) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            kind,
            flags: 0,
            checksum,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..12].copy_from_slice(&self.version.to_le_bytes());
        bytes[12..16].copy_from_slice(&(self.kind as u32).to_le_bytes());
        bytes[16..20].copy_from_slice(&self.flags.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(RangeBenchError::format("result header too small"));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);

        if magic != MAGIC {
            return Err(RangeBenchError::format("invalid magic bytes"));
        }

        let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let kind_raw = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let flags = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let checksum = u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);

        let kind = PayloadKind::from_u32(kind_raw)
            .ok_or_else(|| RangeBenchError::format(format!("unknown payload kind {kind_raw}")))?;

        Ok(Self {
            magic,
            version,
            kind,
            flags,
            checksum,
        })
    }

    /// Verify the header is supported and matches the expected payload.
    pub fn verify(&self, expected: PayloadKind) -> Result<()> {
        if self.version > FORMAT_VERSION {
            return Err(RangeBenchError::format(format!(
                "unsupported version {} (max supported: {})",
                self.version, FORMAT_VERSION
            )));
        }

        if self.kind != expected {
            return Err(RangeBenchError::format(format!(
                "payload kind mismatch: expected {:?}, got {:?}",
                expected, self.kind
            )));
        }

        Ok(())
    }
}
