//! File <-> chunk conversion. No network or storage dependency.

pub mod merge;
pub mod split;

/// Default chunk size: 16 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Largest chunk count that still fits the int32 wire fields.
pub const MAX_CHUNKS: u64 = i32::MAX as u64;
