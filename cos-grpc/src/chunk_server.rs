use std::sync::Arc;

use cos_core::{Chunk, ChunkIndex, ChunkStore, SqlIndex};
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::config::message_limit;
use crate::error::to_status;
use crate::proto::chunk_service_server::{ChunkService, ChunkServiceServer};
use crate::proto::{ChunkInfo, GetChunkRequest, StoreChunkResponse};

/// `ChunkService` backed by a local [`ChunkStore`].
pub struct ChunkServer<I: ChunkIndex = SqlIndex> {
    store: Arc<ChunkStore<I>>,
}

impl<I: ChunkIndex> ChunkServer<I> {
    pub fn new(store: Arc<ChunkStore<I>>) -> Self {
        Self { store }
    }

    pub fn into_service(self, max_chunk_size: usize) -> ChunkServiceServer<Self> {
        let limit = message_limit(max_chunk_size);
        ChunkServiceServer::new(self)
            .max_decoding_message_size(limit)
            .max_encoding_message_size(limit)
    }
}

#[tonic::async_trait]
impl<I: ChunkIndex> ChunkService for ChunkServer<I> {
    async fn store_chunk(
        &self,
        request: Request<ChunkInfo>,
    ) -> Result<Response<StoreChunkResponse>, Status> {
        let chunk = Chunk::try_from(request.into_inner()).map_err(|e| to_status(&e))?;
        match self.store.put(&chunk).await {
            Ok(_) => {
                debug!(chunk_id = %chunk.chunk_id, "store_chunk ok");
                Ok(Response::new(StoreChunkResponse {
                    success: true,
                    message: format!("chunk {} stored", chunk.chunk_id),
                }))
            }
            Err(e) => {
                warn!(chunk_id = %chunk.chunk_id, error = %e, "store_chunk failed");
                Err(to_status(&e))
            }
        }
    }

    async fn get_chunk(
        &self,
        request: Request<GetChunkRequest>,
    ) -> Result<Response<ChunkInfo>, Status> {
        let req = request.into_inner();
        match self.store.get(&req.file_id, &req.chunk_id).await {
            Ok(chunk) => {
                debug!(chunk_id = %req.chunk_id, bytes = chunk.data.len(), "get_chunk ok");
                Ok(Response::new(chunk.into()))
            }
            Err(e) => {
                warn!(chunk_id = %req.chunk_id, error = %e, "get_chunk failed");
                Err(to_status(&e))
            }
        }
    }
}
