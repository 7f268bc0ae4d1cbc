use std::path::{Path, PathBuf};

use libsql::{Builder, Connection, Database, params};
use tracing::{debug, info};

use super::{ChunkIndex, IndexEntry};
use crate::error::{CosError, Result};

pub const INDEX_FILE: &str = "index.db";

// WITHOUT ROWID keeps the rows in a b-tree ordered by chunk_id
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS chunk_index (
    chunk_id     TEXT PRIMARY KEY NOT NULL,
    file_id      TEXT NOT NULL,
    path         TEXT NOT NULL,
    chunk_index  INTEGER NOT NULL,
    total_chunks INTEGER NOT NULL,
    size         INTEGER NOT NULL,
    blake3       BLOB NOT NULL
) WITHOUT ROWID";

const UPSERT: &str = "INSERT INTO chunk_index
    (chunk_id, file_id, path, chunk_index, total_chunks, size, blake3)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(chunk_id) DO UPDATE SET
        file_id = excluded.file_id,
        path = excluded.path,
        chunk_index = excluded.chunk_index,
        total_chunks = excluded.total_chunks,
        size = excluded.size,
        blake3 = excluded.blake3";

const SELECT: &str = "SELECT file_id, path, chunk_index, total_chunks, size, blake3
    FROM chunk_index WHERE chunk_id = ?1";

/// Index persisted in a local SQLite database under `dir`.
pub struct SqlIndex {
    db: Database,
    conn: Connection,
    path: PathBuf,
}

impl SqlIndex {
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(INDEX_FILE);
        let db = Builder::new_local(&path)
            .build()
            .await
            .map_err(|e| CosError::storage(format!("open {}: {e}", path.display())))?;
        let conn = db.connect()?;
        conn.execute(SCHEMA, ()).await?;
        info!(path = %path.display(), "chunk index opened");
        Ok(Self { db, conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn column_u32(v: i64, what: &str, chunk_id: &str) -> Result<u32> {
    u32::try_from(v)
        .map_err(|_| CosError::storage(format!("index row {chunk_id}: bad {what} {v}")))
}

impl ChunkIndex for SqlIndex {
    async fn put(&self, e: &IndexEntry) -> Result<()> {
        self.conn
            .execute(
                UPSERT,
                params![
                    e.chunk_id.clone(),
                    e.file_id.clone(),
                    e.path.to_string_lossy().into_owned(),
                    e.index as i64,
                    e.total_chunks as i64,
                    e.size as i64,
                    e.blake3.to_vec()
                ],
            )
            .await?;
        debug!(chunk_id = %e.chunk_id, "index entry written");
        Ok(())
    }

    async fn get(&self, chunk_id: &str) -> Result<Option<IndexEntry>> {
        let mut rows = self
            .conn
            .query(SELECT, params![chunk_id.to_string()])
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let file_id: String = row.get(0)?;
        let path: String = row.get(1)?;
        let index: i64 = row.get(2)?;
        let total: i64 = row.get(3)?;
        let size: i64 = row.get(4)?;
        let digest: Vec<u8> = row.get(5)?;

        let blake3 = <[u8; 32]>::try_from(digest.as_slice()).map_err(|_| {
            CosError::storage(format!(
                "index row {chunk_id}: digest is {} bytes",
                digest.len()
            ))
        })?;
        Ok(Some(IndexEntry {
            chunk_id: chunk_id.to_string(),
            file_id,
            path: PathBuf::from(path),
            index: column_u32(index, "chunk_index", chunk_id)?,
            total_chunks: column_u32(total, "total_chunks", chunk_id)?,
            size: u64::try_from(size)
                .map_err(|_| CosError::storage(format!("index row {chunk_id}: bad size {size}")))?,
            blake3,
        }))
    }

    async fn close(self) -> Result<()> {
        let Self { db, conn, path } = self;
        // statements autocommit; dropping the handles closes the database file
        drop(conn);
        drop(db);
        info!(path = %path.display(), "chunk index closed");
        Ok(())
    }
}
