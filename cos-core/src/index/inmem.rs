use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{ChunkIndex, IndexEntry};
use crate::error::{CosError, Result};

/// Ordered in-memory index. Lost on restart; used by tests and scratch nodes.
#[derive(Debug, Default)]
pub struct MemIndex {
    by_chunk: Mutex<BTreeMap<String, IndexEntry>>,
}

impl MemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_chunk.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every entry in key order.
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.by_chunk
            .lock()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> CosError {
    CosError::storage("in-memory index lock poisoned")
}

impl ChunkIndex for MemIndex {
    async fn put(&self, entry: &IndexEntry) -> Result<()> {
        let mut m = self.by_chunk.lock().map_err(poisoned)?;
        m.insert(entry.chunk_id.clone(), entry.clone());
        Ok(())
    }

    async fn get(&self, chunk_id: &str) -> Result<Option<IndexEntry>> {
        let m = self.by_chunk.lock().map_err(poisoned)?;
        Ok(m.get(chunk_id).cloned())
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(chunk_id: &str) -> IndexEntry {
        IndexEntry {
            chunk_id: chunk_id.to_string(),
            file_id: "f".into(),
            path: PathBuf::from("/tmp").join(chunk_id),
            index: 0,
            total_chunks: 1,
            size: 0,
            blake3: [0u8; 32],
        }
    }

    #[tokio::test]
    async fn put_get_and_overwrite() {
        let idx = MemIndex::new();
        assert!(idx.get("b").await.unwrap().is_none());

        idx.put(&entry("b")).await.unwrap();
        idx.put(&entry("a")).await.unwrap();
        let mut e = entry("b");
        e.size = 9;
        idx.put(&e).await.unwrap();

        assert_eq!(idx.len(), 2);
        assert_eq!(idx.get("b").await.unwrap().unwrap().size, 9);
        let keys: Vec<_> = idx.entries().into_iter().map(|e| e.chunk_id).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
