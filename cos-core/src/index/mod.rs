//! Durable `chunk_id -> location` mapping, the sole record of which chunks exist.

use std::future::Future;
use std::path::PathBuf;

use crate::error::Result;

pub mod inmem;
pub mod sql;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub file_id: String,
    pub path: PathBuf,
    pub index: u32,
    pub total_chunks: u32,
    pub size: u64,
    pub blake3: [u8; 32],
}

/// Single-key atomic put/get. Nothing spans more than one key.
pub trait ChunkIndex: Send + Sync + 'static {
    /// Insert or overwrite the entry for `entry.chunk_id`.
    fn put(&self, entry: &IndexEntry) -> impl Future<Output = Result<()>> + Send;

    fn get(&self, chunk_id: &str) -> impl Future<Output = Result<Option<IndexEntry>>> + Send;

    /// Flush and release the underlying handle.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}
