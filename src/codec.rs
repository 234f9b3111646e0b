//! Binary codec for query vector batches and range-search ground truth.
//!
//! # Vector-batch layout
//!
//! ```text
//! [COUNT u32][DIMENSION u32][COUNT * DIMENSION x f32, row-major]
//! ```
//!
//! # Ground-truth layout
//!
//! ```text
//! [NQ u32][THRESHOLD f32][OFFSETS (NQ + 1) x u32]
//! [NEIGHBOR_IDS OFFSETS[NQ] x u32][NEIGHBOR_DISTANCES OFFSETS[NQ] x f32]
//! ```
//!
//! All fields are little-endian. Decoders read from any [`Read`] and keep
//! nothing alive once they return; a truncated or inconsistent input is a
//! [`RangeBenchError::Format`], never a partially filled structure.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::constants::codec::{FIELD_WIDTH, MAX_PREALLOC_ELEMENTS, VECTOR_HEADER_SIZE};
use crate::error::{RangeBenchError, Result};
use crate::types::{validate_offsets, GroundTruth, VectorBatch};

/// Elements decoded per read call for array fields.
const READ_CHUNK_ELEMENTS: usize = 1024;

/// Decode a vector batch.
///
/// With `require_non_empty`, a zero `count` or `dimension` is rejected.
///
/// # Errors
/// Returns a format error if the header is truncated, the payload is not a
/// whole number of floats, the float count is not a multiple of `dimension`,
/// or it disagrees with `count * dimension`.
pub fn read_vector_batch<R: Read>(mut reader: R, require_non_empty: bool) -> Result<VectorBatch> {
    let mut header = [0u8; VECTOR_HEADER_SIZE];
    fill(&mut reader, &mut header, "vector batch header")?;
    let count = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let dimension = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

    if require_non_empty && (count == 0 || dimension == 0) {
        return Err(RangeBenchError::format(format!(
            "empty vector batch: count={count}, dimension={dimension}"
        )));
    }

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;

    if payload.len() % FIELD_WIDTH != 0 {
        return Err(RangeBenchError::format(format!(
            "payload of {} bytes is not a whole number of f32 values",
            payload.len()
        )));
    }
    let floats = payload.len() / FIELD_WIDTH;

    if dimension == 0 {
        if count != 0 || floats != 0 {
            return Err(RangeBenchError::format(format!(
                "dimension is zero but header declares {count} vectors and payload holds {floats} floats"
            )));
        }
        return VectorBatch::new(0, 0, Vec::new());
    }

    if floats % dimension != 0 {
        return Err(RangeBenchError::format(format!(
            "payload of {floats} floats is not a multiple of dimension {dimension}"
        )));
    }
    if floats / dimension != count {
        return Err(RangeBenchError::format(format!(
            "header declares {count} vectors but payload holds {}",
            floats / dimension
        )));
    }

    let data: Vec<f32> = payload
        .chunks_exact(FIELD_WIDTH)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    VectorBatch::new(count, dimension, data)
}

/// Decode a range-search ground truth.
///
/// # Errors
/// Returns a format error naming the field if the input ends early, or if
/// the offsets do not start at zero or decrease.
pub fn read_ground_truth<R: Read>(mut reader: R) -> Result<GroundTruth> {
    let nq = read_array(&mut reader, 1, "query count", u32::from_le_bytes)?[0] as usize;
    let threshold = read_array(&mut reader, 1, "threshold", f32::from_le_bytes)?[0];
    let offsets = read_array(&mut reader, nq + 1, "offsets", u32::from_le_bytes)?;
    validate_offsets(&offsets)?;

    let total = offsets[nq] as usize;
    let neighbor_ids = read_array(&mut reader, total, "neighbor ids", u32::from_le_bytes)?;
    let neighbor_distances =
        read_array(&mut reader, total, "neighbor distances", f32::from_le_bytes)?;

    GroundTruth::new(threshold, offsets, neighbor_ids, neighbor_distances)
}

/// Encode a vector batch.
pub fn write_vector_batch<W: Write>(mut writer: W, batch: &VectorBatch) -> Result<()> {
    writer.write_all(&to_u32(batch.count(), "count")?.to_le_bytes())?;
    writer.write_all(&to_u32(batch.dimension(), "dimension")?.to_le_bytes())?;
    for value in batch.as_slice() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Encode a ground truth.
pub fn write_ground_truth<W: Write>(mut writer: W, gt: &GroundTruth) -> Result<()> {
    writer.write_all(&to_u32(gt.query_count(), "query count")?.to_le_bytes())?;
    writer.write_all(&gt.threshold().to_le_bytes())?;
    for offset in gt.offsets() {
        writer.write_all(&offset.to_le_bytes())?;
    }
    for id in gt.neighbor_ids() {
        writer.write_all(&id.to_le_bytes())?;
    }
    for distance in gt.neighbor_distances() {
        writer.write_all(&distance.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a vector batch from a file.
pub fn load_vector_batch(path: impl AsRef<Path>, require_non_empty: bool) -> Result<VectorBatch> {
    let path = path.as_ref();
    let batch = read_vector_batch(BufReader::new(File::open(path)?), require_non_empty)?;
    debug!(
        path = %path.display(),
        count = batch.count(),
        dimension = batch.dimension(),
        "loaded vector batch"
    );
    Ok(batch)
}

/// Load a ground truth from a file.
pub fn load_ground_truth(path: impl AsRef<Path>) -> Result<GroundTruth> {
    let path = path.as_ref();
    let gt = read_ground_truth(BufReader::new(File::open(path)?))?;
    debug!(
        path = %path.display(),
        queries = gt.query_count(),
        threshold = gt.threshold(),
        neighbors = gt.total_neighbors(),
        "loaded ground truth"
    );
    Ok(gt)
}

/// Write a vector batch to a file.
pub fn save_vector_batch(path: impl AsRef<Path>, batch: &VectorBatch) -> Result<()> {
    let file = File::create(path)?;
    write_vector_batch(BufWriter::new(file), batch)
}

/// Write a ground truth to a file.
pub fn save_ground_truth(path: impl AsRef<Path>, gt: &GroundTruth) -> Result<()> {
    let file = File::create(path)?;
    write_ground_truth(BufWriter::new(file), gt)
}

fn to_u32(value: usize, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RangeBenchError::invalid_parameter(format!("{field} {value} exceeds u32")))
}

/// Read exactly `buf.len()` bytes, turning an early end of input into a format error.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8], field: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            RangeBenchError::format(format!("input ends while reading {field}"))
        }
        _ => RangeBenchError::Io(e),
    })
}

/// Read `n` little-endian 4-byte elements.
///
/// Reads in bounded chunks so a corrupt element count fails on the missing
/// bytes instead of on an enormous allocation.
fn read_array<R: Read, T>(
    reader: &mut R,
    n: usize,
    field: &str,
    decode: fn([u8; 4]) -> T,
) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(n.min(MAX_PREALLOC_ELEMENTS));
    let mut buf = [0u8; READ_CHUNK_ELEMENTS * FIELD_WIDTH];
    let mut remaining = n;

    while remaining > 0 {
        let take = remaining.min(READ_CHUNK_ELEMENTS);
        let bytes = &mut buf[..take * FIELD_WIDTH];
        fill(reader, bytes, field).map_err(|e| match e {
            RangeBenchError::Format(_) => RangeBenchError::format(format!(
                "input ends while reading {field}: {} of {n} values present",
                out.len()
            )),
            other => other,
        })?;
        out.extend(
            bytes
                .chunks_exact(FIELD_WIDTH)
                .map(|c| decode([c[0], c[1], c[2], c[3]])),
        );
        remaining -= take;
    }

    Ok(out)
}
