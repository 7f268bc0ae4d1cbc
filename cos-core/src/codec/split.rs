use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::MAX_CHUNKS;
use crate::domain::{Chunk, new_file_id};
use crate::error::{CosError, Result};

/// Lazily cuts a file into fixed-size chunks, front to back.
///
/// The file is read once and the sequence cannot be restarted: open a new
/// `Splitter` (and get a new file id) to read it again. An empty file yields
/// no chunks at all.
pub struct Splitter {
    file: File,
    file_id: String,
    chunk_size: usize,
    file_size: u64,
    total_chunks: u32,
    next: u32,
}

impl Splitter {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CosError::invalid("chunk size must be non-zero"));
        }
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let total = file_size.div_ceil(chunk_size as u64);
        if total > MAX_CHUNKS {
            return Err(CosError::invalid(format!(
                "{} needs {total} chunks of {chunk_size} bytes; at most {MAX_CHUNKS} allowed",
                path.display()
            )));
        }
        Ok(Self {
            file,
            file_id: new_file_id()?,
            chunk_size,
            file_size,
            total_chunks: total as u32,
            next: 0,
        })
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    fn read_next(&mut self) -> Result<Option<Chunk>> {
        if self.next >= self.total_chunks {
            return Ok(None);
        }
        // fill a whole chunk unless EOF comes first; short reads are retried by read_to_end
        let mut data = Vec::with_capacity(self.chunk_size.min(self.file_size as usize));
        (&mut self.file)
            .take(self.chunk_size as u64)
            .read_to_end(&mut data)?;
        if data.is_empty() {
            // file shrank under us; stop here and let the receiver see the gap
            self.next = self.total_chunks;
            return Ok(None);
        }
        let chunk = Chunk::new(&self.file_id, self.next, self.total_chunks, data);
        self.next += 1;
        Ok(Some(chunk))
    }
}

impl Iterator for Splitter {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(c)) => Some(Ok(c)),
            Ok(None) => None,
            Err(e) => {
                self.next = self.total_chunks;
                Some(Err(e))
            }
        }
    }
}

/// Split `path` into `ceil(size / chunk_size)` chunks sharing one fresh file id.
pub fn split(path: &Path, chunk_size: usize) -> Result<Vec<Chunk>> {
    Splitter::open(path, chunk_size)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, len: usize) -> std::path::PathBuf {
        let path = dir.path().join("src.bin");
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        File::create(&path).unwrap().write_all(&data).unwrap();
        path
    }

    #[test]
    fn chunk_count_and_tail_length() {
        let dir = TempDir::new().unwrap();
        for (len, size) in [(10, 3), (9, 3), (1, 4096), (4096, 4096), (4097, 4096)] {
            let path = write_file(&dir, len);
            let chunks = split(&path, size).unwrap();
            let expected = len.div_ceil(size);
            assert_eq!(chunks.len(), expected, "len={len} size={size}");

            let fid = &chunks[0].file_id;
            for (i, c) in chunks.iter().enumerate() {
                assert_eq!(c.index as usize, i);
                assert_eq!(c.total_chunks as usize, expected);
                assert_eq!(&c.file_id, fid);
                c.validate().unwrap();
            }
            let tail = if len % size == 0 { size } else { len % size };
            assert_eq!(chunks.last().unwrap().data.len(), tail);
        }
    }

    #[test]
    fn empty_file_has_no_chunks() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 0);
        let s = Splitter::open(&path, 16).unwrap();
        assert_eq!(s.total_chunks(), 0);
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn each_split_mints_a_new_file_id() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 100);
        let a = split(&path, 64).unwrap();
        let b = split(&path, 64).unwrap();
        assert_ne!(a[0].file_id, b[0].file_id);
        assert_eq!(a[0].data, b[0].data);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 5);
        assert!(matches!(
            Splitter::open(&path, 0),
            Err(CosError::InvalidChunk(_))
        ));
    }

    #[test]
    fn missing_source_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = split(&dir.path().join("nope"), 8).unwrap_err();
        assert!(matches!(err, CosError::Io(_)));
    }
}
