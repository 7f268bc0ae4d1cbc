//! Chunk storage engine: one file per chunk plus an index pointing at it.
//!
//! A chunk exists once both its file and its index entry are written, in that
//! order, so an index entry never points at a file that was not written. When
//! the index write fails the fresh file is removed again; a leftover orphan
//! file is tolerated, a dangling index entry is not.
//!
//! Re-putting a chunk id overwrites both file and entry. That is only safe when
//! the caller sends the same payload for the same chunk id.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::codec::DEFAULT_CHUNK_SIZE;
use crate::domain::Chunk;
use crate::error::{CosError, Result};
use crate::index::sql::SqlIndex;
use crate::index::{ChunkIndex, IndexEntry};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub index_dir: PathBuf,
    pub chunk_root: PathBuf,
    /// Payloads larger than this are refused.
    pub max_chunk_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("data/index"),
            chunk_root: PathBuf::from("data/chunks"),
            max_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct ChunkStore<I: ChunkIndex = SqlIndex> {
    index: I,
    chunk_root: PathBuf,
    max_chunk_size: usize,
}

impl ChunkStore<SqlIndex> {
    /// Open (or create) the on-disk store described by `cfg`.
    pub async fn open(cfg: &StoreConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&cfg.chunk_root).await?;
        let index = SqlIndex::open(&cfg.index_dir).await?;
        info!(
            chunk_root = %cfg.chunk_root.display(),
            max_chunk_size = cfg.max_chunk_size,
            "chunk store ready"
        );
        Ok(Self::with_index(
            index,
            cfg.chunk_root.clone(),
            cfg.max_chunk_size,
        ))
    }
}

impl<I: ChunkIndex> ChunkStore<I> {
    pub fn with_index(index: I, chunk_root: PathBuf, max_chunk_size: usize) -> Self {
        Self {
            index,
            chunk_root,
            max_chunk_size,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn chunk_root(&self) -> &Path {
        &self.chunk_root
    }

    pub fn chunk_path(&self, file_id: &str, chunk_id: &str) -> PathBuf {
        self.chunk_root.join(file_id).join(chunk_id)
    }

    /// Store one chunk and return where its payload lives.
    pub async fn put(&self, chunk: &Chunk) -> Result<PathBuf> {
        chunk.validate()?;
        if chunk.data.len() > self.max_chunk_size {
            return Err(CosError::invalid(format!(
                "chunk {} is {} bytes, limit is {}",
                chunk.chunk_id,
                chunk.data.len(),
                self.max_chunk_size
            )));
        }

        let path = self.chunk_path(&chunk.file_id, &chunk.chunk_id);
        // a retried put may already be indexed at this path
        let previous = self.index.get(&chunk.chunk_id).await?;

        write_chunk_file(&path, &chunk.data).await?;

        let entry = IndexEntry {
            chunk_id: chunk.chunk_id.clone(),
            file_id: chunk.file_id.clone(),
            path: path.clone(),
            index: chunk.index,
            total_chunks: chunk.total_chunks,
            size: chunk.data.len() as u64,
            blake3: *blake3::hash(&chunk.data).as_bytes(),
        };
        if let Err(cause) = self.index.put(&entry).await {
            let still_indexed = previous.is_some_and(|p| p.path == path);
            return Err(roll_back(&path, still_indexed, cause).await);
        }

        debug!(
            chunk_id = %chunk.chunk_id,
            index = chunk.index,
            total = chunk.total_chunks,
            bytes = chunk.data.len(),
            "chunk stored"
        );
        Ok(path)
    }

    /// Fetch a stored chunk with its position metadata.
    pub async fn get(&self, file_id: &str, chunk_id: &str) -> Result<Chunk> {
        let entry = match self.index.get(chunk_id).await? {
            Some(e) if e.file_id == file_id => e,
            _ => {
                return Err(CosError::NotFound(format!(
                    "chunk {chunk_id} of file {file_id}"
                )));
            }
        };

        let data = match tokio::fs::read(&entry.path).await {
            Ok(d) => d,
            Err(e) => {
                error!(
                    chunk_id,
                    path = %entry.path.display(),
                    error = %e,
                    "dangling index entry"
                );
                return Err(CosError::Inconsistent(format!(
                    "dangling entry {chunk_id} -> {}: {e}",
                    entry.path.display()
                )));
            }
        };
        if data.len() as u64 != entry.size || blake3::hash(&data).as_bytes() != &entry.blake3 {
            error!(
                chunk_id,
                path = %entry.path.display(),
                expected = entry.size,
                actual = data.len(),
                "chunk file does not match its index entry"
            );
            return Err(CosError::Inconsistent(format!(
                "chunk file {} is corrupt",
                entry.path.display()
            )));
        }

        Ok(Chunk {
            file_id: entry.file_id,
            chunk_id: entry.chunk_id,
            index: entry.index,
            total_chunks: entry.total_chunks,
            data,
        })
    }

    /// Release the index. Consumes the store, so it can only happen once.
    pub async fn close(self) -> Result<()> {
        self.index.close().await
    }
}

/// Write via a sibling temp file so a crash never leaves a torn chunk at `path`.
async fn write_chunk_file(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("part");
    let res = async {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let mut f = tokio::fs::File::create(&tmp).await?;
        f.write_all(data).await?;
        f.sync_all().await?;
        drop(f);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = res {
        // the temp name is never indexed, so a leftover is only litter
        if let Err(rm) = tokio::fs::remove_file(&tmp).await {
            debug!(path = %tmp.display(), error = %rm, "temp chunk file not removed");
        }
        return Err(CosError::storage(format!(
            "write chunk file {}: {e}",
            path.display()
        )));
    }
    Ok(())
}

async fn roll_back(path: &Path, still_indexed: bool, cause: CosError) -> CosError {
    if still_indexed {
        warn!(
            path = %path.display(),
            error = %cause,
            "index write failed; keeping file referenced by earlier entry"
        );
        return CosError::storage(format!("index write failed: {cause}"));
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            warn!(path = %path.display(), error = %cause, "index write failed; chunk file removed");
            CosError::storage(format!("index write failed: {cause}"))
        }
        Err(rm) => {
            error!(
                path = %path.display(),
                error = %cause,
                rollback_error = %rm,
                "index write failed and rollback failed; orphan chunk file left"
            );
            CosError::storage(format!(
                "index write failed: {cause}; rollback of {} failed: {rm}",
                path.display()
            ))
        }
    }
}
