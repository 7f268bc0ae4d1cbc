// cos_core/src/domain.rs
use serde::{Deserialize, Serialize};

use crate::error::{CosError, Result};

/// Length of a rendered file id: 16 random bytes as lowercase hex.
pub const FILE_ID_LEN: usize = 32;

const CHUNK_ID_SEP: &str = "_chunk";

/// One slice of a file plus the metadata needed to put it back in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub file_id: String,
    pub chunk_id: String,
    pub index: u32,
    pub total_chunks: u32,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(file_id: &str, index: u32, total_chunks: u32, data: Vec<u8>) -> Self {
        Self {
            file_id: file_id.to_string(),
            chunk_id: chunk_id_for(file_id, index),
            index,
            total_chunks,
            data,
        }
    }

    /// Checks the identity fields against each other. Says nothing about the payload.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_file_id(&self.file_id) {
            return Err(CosError::invalid(format!(
                "malformed file id {:?}",
                self.file_id
            )));
        }
        if self.total_chunks == 0 || self.index >= self.total_chunks {
            return Err(CosError::invalid(format!(
                "chunk index {} out of range for {} chunks",
                self.index, self.total_chunks
            )));
        }
        let expected = chunk_id_for(&self.file_id, self.index);
        if self.chunk_id != expected {
            return Err(CosError::invalid(format!(
                "chunk id {:?} does not match {expected:?}",
                self.chunk_id
            )));
        }
        Ok(())
    }
}

/// Mint a fresh file id (128 bits of entropy).
pub fn new_file_id() -> Result<String> {
    let mut b = [0u8; FILE_ID_LEN / 2];
    getrandom::getrandom(&mut b)
        .map_err(|e| std::io::Error::other(format!("entropy source: {e}")))?;
    Ok(hex::encode(b))
}

pub fn chunk_id_for(file_id: &str, index: u32) -> String {
    format!("{file_id}{CHUNK_ID_SEP}{index}")
}

pub fn is_valid_file_id(s: &str) -> bool {
    s.len() == FILE_ID_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Split a chunk id back into `(file_id, index)`; `None` for anything we did not mint.
pub fn parse_chunk_id(chunk_id: &str) -> Option<(&str, u32)> {
    let (file_id, idx) = chunk_id.split_once(CHUNK_ID_SEP)?;
    if !is_valid_file_id(file_id) || idx.is_empty() || !idx.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    // reject "007" so that every index has exactly one id
    if idx.len() > 1 && idx.starts_with('0') {
        return None;
    }
    Some((file_id, idx.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ids_are_fresh_hex() {
        let a = new_file_id().unwrap();
        let b = new_file_id().unwrap();
        assert!(is_valid_file_id(&a));
        assert!(is_valid_file_id(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn chunk_id_round_trips_through_parse() {
        let fid = new_file_id().unwrap();
        let id = chunk_id_for(&fid, 12);
        assert_eq!(id, format!("{fid}_chunk12"));
        assert_eq!(parse_chunk_id(&id), Some((fid.as_str(), 12)));
    }

    #[test]
    fn parse_rejects_foreign_ids() {
        let fid = new_file_id().unwrap();
        assert_eq!(parse_chunk_id("../../etc/passwd"), None);
        assert_eq!(parse_chunk_id(&format!("{fid}_chunk")), None);
        assert_eq!(parse_chunk_id(&format!("{fid}_chunk01")), None);
        assert_eq!(parse_chunk_id(&format!("{fid}_chunk-1")), None);
        assert_eq!(parse_chunk_id("ABC_chunk0"), None);
    }

    #[test]
    fn validate_catches_mismatched_identity() {
        let fid = new_file_id().unwrap();
        let mut c = Chunk::new(&fid, 1, 3, vec![1, 2, 3]);
        assert!(c.validate().is_ok());

        c.chunk_id = chunk_id_for(&fid, 2);
        assert!(matches!(c.validate(), Err(CosError::InvalidChunk(_))));

        let c = Chunk::new(&fid, 3, 3, vec![]);
        assert!(c.validate().is_err());

        let c = Chunk::new("not-a-file-id", 0, 1, vec![]);
        assert!(c.validate().is_err());
    }
}
