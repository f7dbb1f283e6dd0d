//! LAS point file codec.
//!
//! Reads LAS 1.0 to 1.4 with point data formats 0 to 10. Only the fields the
//! mesh pipeline consumes are decoded: scaled x/y/z and intensity, which sit
//! at the same offsets in every point format.
//!
//! The writer emits LAS 1.2 point format 0 and exists for test fixtures.

use std::io::Write;
use std::path::Path;
use thiserror::Error;

use super::record::{PointRecord, PointRow, sample_indices};
use crate::core::task::TaskError;

const SIGNATURE: &[u8; 4] = b"LASF";
/// Header size of LAS 1.0 to 1.2.
const LEGACY_HEADER_SIZE: usize = 227;
/// Offset of the 64-bit point count added in LAS 1.4.
const POINT_COUNT_64_OFFSET: usize = 247;
const HEADER_SIZE_14: usize = 375;

/// Minimum record length of each point data format.
const MIN_RECORD_LENGTH: [u16; 11] = [20, 28, 26, 34, 57, 63, 30, 36, 38, 59, 67];

/// Errors decoding a LAS file.
#[derive(Debug, Error)]
pub enum LasError {
    #[error("not a LAS file (missing LASF signature)")]
    NotLas,

    #[error("unsupported LAS version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("unsupported point data format {0}")]
    UnsupportedFormat(u8),

    #[error("compressed point data is not supported")]
    Compressed,

    #[error("point record length {length} is too short for format {format}")]
    RecordTooShort { format: u8, length: u16 },

    #[error("file truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Public header fields relevant to point decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct LasHeader {
    pub version: (u8, u8),
    pub point_format: u8,
    pub record_length: u16,
    pub point_count: u64,
    pub point_offset: u32,
    pub scale: [f64; 3],
    pub offset: [f64; 3],
}

impl LasHeader {
    /// Parse the public header block.
    pub fn parse(bytes: &[u8]) -> Result<Self, LasError> {
        if bytes.len() < 4 || &bytes[..4] != SIGNATURE {
            return Err(LasError::NotLas);
        }
        need(bytes, LEGACY_HEADER_SIZE)?;

        let version = (bytes[24], bytes[25]);
        if version.0 != 1 || version.1 > 4 {
            return Err(LasError::UnsupportedVersion {
                major: version.0,
                minor: version.1,
            });
        }

        let raw_format = bytes[104];
        if raw_format & 0xC0 != 0 {
            return Err(LasError::Compressed);
        }
        let point_format = raw_format & 0x3F;
        let Some(min_length) = MIN_RECORD_LENGTH.get(point_format as usize) else {
            return Err(LasError::UnsupportedFormat(point_format));
        };
        let record_length = u16_at(bytes, 105);
        if record_length < *min_length {
            return Err(LasError::RecordTooShort {
                format: point_format,
                length: record_length,
            });
        }

        let mut point_count = u64::from(u32_at(bytes, 107));
        if point_count == 0 && version.1 >= 4 {
            need(bytes, HEADER_SIZE_14)?;
            point_count = u64_at(bytes, POINT_COUNT_64_OFFSET);
        }

        Ok(Self {
            version,
            point_format,
            record_length,
            point_count,
            point_offset: u32_at(bytes, 96),
            scale: [f64_at(bytes, 131), f64_at(bytes, 139), f64_at(bytes, 147)],
            offset: [f64_at(bytes, 155), f64_at(bytes, 163), f64_at(bytes, 171)],
        })
    }
}

/// Decode the points of a LAS file, keeping a deterministic `sampling_rate`
/// share of them.
pub fn decode(bytes: &[u8], sampling_rate: f64) -> Result<PointRecord, LasError> {
    let header = LasHeader::parse(bytes)?;
    let start = header.point_offset as usize;
    let stride = header.record_length as usize;
    let count = usize::try_from(header.point_count).unwrap_or(usize::MAX);
    let end = count
        .checked_mul(stride)
        .and_then(|len| len.checked_add(start))
        .unwrap_or(usize::MAX);
    need(bytes, end)?;

    let rows = sample_indices(count, sampling_rate)
        .map(|i| {
            let at = start + i * stride;
            let raw = [i32_at(bytes, at), i32_at(bytes, at + 4), i32_at(bytes, at + 8)];
            let mut row: PointRow = [0.0; 4];
            for axis in 0..3 {
                row[axis] = f64::from(raw[axis]) * header.scale[axis] + header.offset[axis];
            }
            row[3] = f64::from(u16_at(bytes, at + 12));
            row
        })
        .collect();
    Ok(PointRecord::new(rows))
}

/// Read and decode a LAS file from disk.
pub fn read_las(path: &Path, sampling_rate: f64) -> Result<PointRecord, TaskError> {
    let bytes = std::fs::read(path).map_err(|e| TaskError::io(path, e))?;
    decode(&bytes, sampling_rate)
        .map_err(|e| TaskError::Decode(format!("{}: {e}", path.display())))
}

/// Write `rows` as a LAS 1.2 point format 0 file with a 1 mm scale.
pub fn write_las(out: &mut dyn Write, rows: &[PointRow]) -> std::io::Result<()> {
    let scale = [0.001_f64; 3];
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for row in rows {
        for axis in 0..3 {
            min[axis] = min[axis].min(row[axis]);
            max[axis] = max[axis].max(row[axis]);
        }
    }
    let offset = if rows.is_empty() {
        [0.0; 3]
    } else {
        min.map(f64::floor)
    };
    if rows.is_empty() {
        min = [0.0; 3];
        max = [0.0; 3];
    }

    let count = u32::try_from(rows.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "too many points for LAS 1.2")
    })?;

    let mut header = vec![0u8; LEGACY_HEADER_SIZE];
    header[..4].copy_from_slice(SIGNATURE);
    header[24] = 1;
    header[25] = 2;
    put(&mut header, 26, b"lasmesh");
    put(&mut header, 58, b"lasmesh");
    put(&mut header, 94, &(LEGACY_HEADER_SIZE as u16).to_le_bytes());
    put(&mut header, 96, &(LEGACY_HEADER_SIZE as u32).to_le_bytes());
    header[104] = 0;
    put(&mut header, 105, &MIN_RECORD_LENGTH[0].to_le_bytes());
    put(&mut header, 107, &count.to_le_bytes());
    put(&mut header, 111, &count.to_le_bytes());
    for axis in 0..3 {
        put(&mut header, 131 + axis * 8, &scale[axis].to_le_bytes());
        put(&mut header, 155 + axis * 8, &offset[axis].to_le_bytes());
        put(&mut header, 179 + axis * 16, &max[axis].to_le_bytes());
        put(&mut header, 187 + axis * 16, &min[axis].to_le_bytes());
    }
    out.write_all(&header)?;

    let mut record = [0u8; 20];
    for row in rows {
        for axis in 0..3 {
            let raw = ((row[axis] - offset[axis]) / scale[axis]).round() as i32;
            record[axis * 4..axis * 4 + 4].copy_from_slice(&raw.to_le_bytes());
        }
        let intensity = row[3].clamp(0.0, f64::from(u16::MAX)) as u16;
        record[12..14].copy_from_slice(&intensity.to_le_bytes());
        // single return, class 1 (unclassified)
        record[14] = 0b0000_1001;
        record[15] = 1;
        out.write_all(&record)?;
    }
    out.flush()
}

fn need(bytes: &[u8], expected: usize) -> Result<(), LasError> {
    if bytes.len() < expected {
        Err(LasError::Truncated {
            expected,
            actual: bytes.len(),
        })
    } else {
        Ok(())
    }
}

fn put(buf: &mut [u8], at: usize, value: &[u8]) {
    buf[at..at + value.len()].copy_from_slice(value);
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn i32_at(b: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn u64_at(b: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn f64_at(b: &[u8], at: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[at..at + 8]);
    f64::from_le_bytes(raw)
}
