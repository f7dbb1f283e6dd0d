//! Point cloud files and sampled point records.

pub mod las;
mod record;

pub use las::{LasError, LasHeader, read_las, write_las};
pub use record::{DIMENSIONS, PointRecord, PointRow, sample_indices, sampled_len};
