#![forbid(unsafe_code)]

pub mod error;

pub mod domain;

pub mod codec;

pub mod index;

pub mod store;

// Re-exports: stable API surface
pub use codec::merge::{arrange, merge};
pub use codec::split::{Splitter, split};
pub use codec::DEFAULT_CHUNK_SIZE;
pub use domain::{Chunk, chunk_id_for, is_valid_file_id, new_file_id, parse_chunk_id};
pub use error::{CosError, Result};
pub use index::{ChunkIndex, IndexEntry, inmem::MemIndex, sql::SqlIndex};
pub use store::{ChunkStore, StoreConfig};
