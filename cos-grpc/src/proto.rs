//! Wire messages for package `cos` plus the generated service stubs.

use cos_core::{Chunk, CosError};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChunkInfo {
    #[prost(string, tag = "1")]
    pub file_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub chunk_id: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "3")]
    pub data: ::prost::alloc::vec::Vec<u8>,
    #[prost(int32, tag = "4")]
    pub chunk_index: i32,
    #[prost(int32, tag = "5")]
    pub total_chunks: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StoreChunkResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetChunkRequest {
    #[prost(string, tag = "1")]
    pub file_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub chunk_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UploadFileResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub file_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DownloadFileRequest {
    #[prost(string, tag = "1")]
    pub file_id: ::prost::alloc::string::String,
    /// Where the client intends to write the file; informational for the gateway.
    #[prost(string, tag = "2")]
    pub save_path: ::prost::alloc::string::String,
}

include!(concat!(env!("OUT_DIR"), "/cos.ChunkService.rs"));
include!(concat!(env!("OUT_DIR"), "/cos.ObjectService.rs"));

impl From<Chunk> for ChunkInfo {
    fn from(c: Chunk) -> Self {
        // Chunk positions are capped at i32::MAX by the splitter
        Self {
            file_id: c.file_id,
            chunk_id: c.chunk_id,
            data: c.data,
            chunk_index: c.index as i32,
            total_chunks: c.total_chunks as i32,
        }
    }
}

impl TryFrom<ChunkInfo> for Chunk {
    type Error = CosError;

    fn try_from(m: ChunkInfo) -> Result<Self, Self::Error> {
        let index = u32::try_from(m.chunk_index)
            .map_err(|_| CosError::invalid(format!("negative chunk index {}", m.chunk_index)))?;
        let total_chunks = u32::try_from(m.total_chunks)
            .map_err(|_| CosError::invalid(format!("negative chunk count {}", m.total_chunks)))?;
        Ok(Chunk {
            file_id: m.file_id,
            chunk_id: m.chunk_id,
            index,
            total_chunks,
            data: m.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_converts_both_ways() {
        let fid = cos_core::new_file_id().unwrap();
        let c = Chunk::new(&fid, 4, 9, b"data".to_vec());
        let m = ChunkInfo::from(c.clone());
        assert_eq!(m.chunk_index, 4);
        assert_eq!(m.total_chunks, 9);
        assert_eq!(Chunk::try_from(m).unwrap(), c);
    }

    #[test]
    fn negative_positions_are_invalid() {
        let m = ChunkInfo {
            chunk_index: -1,
            total_chunks: 1,
            ..Default::default()
        };
        assert!(matches!(Chunk::try_from(m), Err(CosError::InvalidChunk(_))));
    }
}
