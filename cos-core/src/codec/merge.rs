use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::domain::Chunk;
use crate::error::{CosError, Result};

/// Sort `chunks` by index and check they form one complete file.
///
/// All chunks must share `file_id` and `total_chunks`, and the indices must be
/// exactly `0..total_chunks`. An empty slice is the (complete) empty file.
pub fn arrange(chunks: &mut [Chunk]) -> Result<()> {
    chunks.sort_by_key(|c| c.index);
    let Some(first) = chunks.first() else {
        return Ok(());
    };
    let file_id = first.file_id.clone();
    let total = first.total_chunks;
    if chunks.len() as u64 > total as u64 {
        return Err(CosError::invalid(format!(
            "{} chunks for file {file_id}, which has {total}",
            chunks.len()
        )));
    }

    for c in chunks.iter() {
        if c.file_id != file_id {
            return Err(CosError::invalid(format!(
                "chunk {} belongs to {}, expected {file_id}",
                c.chunk_id, c.file_id
            )));
        }
        if c.total_chunks != total {
            return Err(CosError::invalid(format!(
                "chunk {} claims {} chunks, expected {total}",
                c.chunk_id, c.total_chunks
            )));
        }
    }

    for (want, c) in (0u32..).zip(chunks.iter()) {
        if c.index < want {
            return Err(CosError::invalid(format!("duplicate chunk index {}", c.index)));
        }
        if c.index > want {
            return Err(CosError::MissingChunk {
                file_id,
                index: want,
            });
        }
    }
    if (chunks.len() as u64) < total as u64 {
        return Err(CosError::MissingChunk {
            file_id,
            index: chunks.len() as u32,
        });
    }
    Ok(())
}

/// Reassemble `chunks` into `dest`, returning the number of bytes written.
///
/// Chunks may arrive in any order; they are sorted and checked with
/// [`arrange`] before anything touches the disk. Output goes to a temp file
/// next to `dest` and is renamed into place once complete.
pub fn merge(dest: &Path, mut chunks: Vec<Chunk>) -> Result<u64> {
    arrange(&mut chunks)?;

    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut written = 0u64;
    for c in &chunks {
        tmp.write_all(&c.data)?;
        written += c.data.len() as u64;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::split::split;
    use crate::domain::new_file_id;
    use tempfile::TempDir;

    fn chunks_of(parts: &[&str]) -> Vec<Chunk> {
        let fid = new_file_id().unwrap();
        let total = parts.len() as u32;
        (0u32..)
            .zip(parts)
            .map(|(i, p)| Chunk::new(&fid, i, total, p.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn round_trip_across_sizes() {
        let dir = TempDir::new().unwrap();
        for (len, size) in [(0usize, 7usize), (1, 7), (6, 7), (7, 7), (50, 7), (1000, 1)] {
            let content: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
            let src = dir.path().join(format!("in-{len}-{size}"));
            std::fs::write(&src, &content).unwrap();

            let out = dir.path().join("out").join(format!("{len}-{size}"));
            let n = merge(&out, split(&src, size).unwrap()).unwrap();
            assert_eq!(n, len as u64);
            assert_eq!(std::fs::read(&out).unwrap(), content);
        }
    }

    #[test]
    fn out_of_order_input_is_sorted() {
        let dir = TempDir::new().unwrap();
        let mut chunks = chunks_of(&["ab", "cd", "e"]);
        chunks.reverse();
        let out = dir.path().join("f");
        merge(&out, chunks).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), b"abcde");
    }

    #[test]
    fn gap_is_missing_chunk_and_nothing_written() {
        let dir = TempDir::new().unwrap();
        let mut chunks = chunks_of(&["a", "b", "c"]);
        let fid = chunks[0].file_id.clone();
        chunks.remove(1);
        let out = dir.path().join("f");
        match merge(&out, chunks) {
            Err(CosError::MissingChunk { file_id, index }) => {
                assert_eq!(file_id, fid);
                assert_eq!(index, 1);
            }
            other => panic!("expected MissingChunk, got {other:?}"),
        }
        assert!(!out.exists());
    }

    #[test]
    fn truncated_tail_is_missing_chunk() {
        let mut chunks = chunks_of(&["a", "b", "c"]);
        chunks.pop();
        assert!(matches!(
            arrange(&mut chunks),
            Err(CosError::MissingChunk { index: 2, .. })
        ));
    }

    #[test]
    fn mixed_files_and_duplicates_are_rejected() {
        let mut a = chunks_of(&["a", "b"]);
        let b = chunks_of(&["x", "y"]);
        a[1] = b[1].clone();
        assert!(matches!(arrange(&mut a), Err(CosError::InvalidChunk(_))));

        let mut d = chunks_of(&["a", "b"]);
        let dup = d[0].clone();
        d.push(dup);
        assert!(matches!(arrange(&mut d), Err(CosError::InvalidChunk(_))));
    }

    #[test]
    fn chunks_past_total_are_rejected() {
        let dir = TempDir::new().unwrap();
        let fid = new_file_id().unwrap();
        let chunks: Vec<_> = (0..3).map(|i| Chunk::new(&fid, i, 2, vec![b'x'])).collect();
        let out = dir.path().join("f");
        assert!(matches!(
            merge(&out, chunks),
            Err(CosError::InvalidChunk(_))
        ));
        assert!(!out.exists());

        let mut zero = vec![Chunk::new(&fid, 0, 0, vec![b'x'])];
        assert!(matches!(arrange(&mut zero), Err(CosError::InvalidChunk(_))));
    }
}
