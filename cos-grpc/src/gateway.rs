//! Stateless relay between `ObjectService` (clients) and `ChunkService` (storage).
//!
//! Uploads are forwarded one chunk at a time: the next inbound chunk is not
//! read until the previous one was acknowledged by the chunk server. Any
//! failure ends the whole upload; there is no partial success and no retry.
//! Downloads learn the chunk count from chunk 0 as stored by the chunk server.

use std::time::Duration;

use cos_core::{Chunk, chunk_id_for, is_valid_file_id};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info, warn};

use crate::config::{GatewayConfig, connect_timeout, message_limit};
use crate::error::Result;
use crate::proto::chunk_service_client::ChunkServiceClient;
use crate::proto::object_service_server::{ObjectService, ObjectServiceServer};
use crate::proto::{ChunkInfo, DownloadFileRequest, GetChunkRequest, UploadFileResponse};
use crate::within;

#[derive(Clone)]
pub struct Gateway {
    chunks: ChunkServiceClient<Channel>,
    chunk_timeout: Option<Duration>,
    max_chunk_size: usize,
}

impl Gateway {
    /// Build a gateway for `cfg.chunk_server`. The upstream connection is
    /// established lazily, so the gateway starts even if storage is down.
    pub fn connect(cfg: &GatewayConfig) -> Result<Self> {
        let channel = Endpoint::from_shared(cfg.chunk_server.clone())?
            .connect_timeout(connect_timeout(cfg.connect_timeout_secs))
            .connect_lazy();
        Ok(Self::new(channel, cfg))
    }

    pub fn new(channel: Channel, cfg: &GatewayConfig) -> Self {
        let limit = message_limit(cfg.max_chunk_size);
        Self {
            chunks: ChunkServiceClient::new(channel)
                .max_decoding_message_size(limit)
                .max_encoding_message_size(limit),
            chunk_timeout: cfg.chunk_timeout(),
            max_chunk_size: cfg.max_chunk_size,
        }
    }

    pub fn into_service(self) -> ObjectServiceServer<Self> {
        let limit = message_limit(self.max_chunk_size);
        ObjectServiceServer::new(self)
            .max_decoding_message_size(limit)
            .max_encoding_message_size(limit)
    }

    async fn forward(&self, chunk: ChunkInfo) -> std::result::Result<(), String> {
        let chunk_id = chunk.chunk_id.clone();
        let mut client = self.chunks.clone();
        match within(self.chunk_timeout, client.store_chunk(chunk)).await {
            Ok(Ok(resp)) => {
                let resp = resp.into_inner();
                if resp.success {
                    Ok(())
                } else {
                    Err(format!("store chunk {chunk_id}: {}", resp.message))
                }
            }
            Ok(Err(status)) => Err(format!("store chunk {chunk_id}: {}", status.message())),
            Err(_) => Err(format!("store chunk {chunk_id}: timed out")),
        }
    }

    async fn fetch(&self, file_id: &str, index: u32) -> std::result::Result<ChunkInfo, Status> {
        let req = GetChunkRequest {
            file_id: file_id.to_string(),
            chunk_id: chunk_id_for(file_id, index),
        };
        let mut client = self.chunks.clone();
        match within(self.chunk_timeout, client.get_chunk(req)).await {
            Ok(Ok(resp)) => Ok(resp.into_inner()),
            Ok(Err(status)) => {
                warn!(file_id, index, error = %status.message(), "get chunk failed");
                Err(status)
            }
            Err(_) => Err(Status::deadline_exceeded(format!(
                "get chunk {index} of {file_id}: timed out"
            ))),
        }
    }

    /// Push chunks `1..total` after `first`, stopping at the first failure.
    async fn relay(
        self,
        file_id: String,
        first: ChunkInfo,
        total: u32,
        tx: mpsc::Sender<std::result::Result<ChunkInfo, Status>>,
    ) {
        if !self.send(&tx, Ok(first)).await {
            return;
        }
        for index in 1..total {
            let item = self.fetch(&file_id, index).await.and_then(|c| {
                if c.chunk_index as i64 != index as i64 || c.total_chunks as i64 != total as i64 {
                    Err(Status::data_loss(format!(
                        "chunk {} claims position {}/{}, expected {index}/{total}",
                        c.chunk_id, c.chunk_index, c.total_chunks
                    )))
                } else {
                    Ok(c)
                }
            });
            let failed = item.is_err();
            if !self.send(&tx, item).await || failed {
                return;
            }
        }
        info!(file_id = %file_id, chunks = total, "download relayed");
    }

    async fn send(
        &self,
        tx: &mpsc::Sender<std::result::Result<ChunkInfo, Status>>,
        item: std::result::Result<ChunkInfo, Status>,
    ) -> bool {
        match within(self.chunk_timeout, tx.send(item)).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                debug!("download client went away");
                false
            }
            Err(_) => {
                warn!("download client stalled; aborting");
                false
            }
        }
    }
}

/// Ordering and identity checks for one upload stream.
#[derive(Debug, Default)]
pub(crate) struct UploadProgress {
    file: Option<(String, u32)>,
    forwarded: u32,
}

impl UploadProgress {
    /// Check `chunk` is the next one this upload expects.
    pub(crate) fn admit(&mut self, chunk: &Chunk) -> std::result::Result<(), String> {
        chunk.validate().map_err(|e| e.to_string())?;
        let (file_id, total) = self
            .file
            .get_or_insert_with(|| (chunk.file_id.clone(), chunk.total_chunks));
        if chunk.file_id != *file_id {
            return Err(format!(
                "chunk {} belongs to {}, upload is {file_id}",
                chunk.chunk_id, chunk.file_id
            ));
        }
        if chunk.total_chunks != *total {
            return Err(format!(
                "chunk {} claims {} chunks, upload has {total}",
                chunk.chunk_id, chunk.total_chunks
            ));
        }
        if chunk.index != self.forwarded {
            return Err(format!(
                "expected chunk {}, got {}",
                self.forwarded, chunk.index
            ));
        }
        Ok(())
    }

    pub(crate) fn forwarded(&mut self) {
        self.forwarded += 1;
    }

    pub(crate) fn file_id(&self) -> &str {
        self.file.as_ref().map(|(f, _)| f.as_str()).unwrap_or("")
    }

    /// Outcome once the client closed its stream.
    pub(crate) fn finish(&self) -> std::result::Result<u32, String> {
        match &self.file {
            None => Err("upload stream carried no chunks".into()),
            Some((_, total)) if self.forwarded < *total => Err(format!(
                "upload ended after {} of {total} chunks",
                self.forwarded
            )),
            Some((_, total)) => Ok(*total),
        }
    }
}

fn summary(progress: &UploadProgress, outcome: std::result::Result<u32, String>) -> UploadFileResponse {
    let file_id = progress.file_id().to_string();
    match outcome {
        Ok(total) => {
            info!(file_id = %file_id, chunks = total, "upload complete");
            UploadFileResponse {
                message: format!("file {file_id} uploaded ({total} chunks)"),
                success: true,
                file_id,
            }
        }
        Err(reason) => {
            warn!(file_id = %file_id, reason = %reason, "upload aborted");
            UploadFileResponse {
                message: reason,
                success: false,
                file_id,
            }
        }
    }
}

#[tonic::async_trait]
impl ObjectService for Gateway {
    async fn upload_file(
        &self,
        request: Request<Streaming<ChunkInfo>>,
    ) -> std::result::Result<Response<UploadFileResponse>, Status> {
        let mut inbound = request.into_inner();
        let mut progress = UploadProgress::default();

        loop {
            let next = within(self.chunk_timeout, inbound.message())
                .await
                .map_err(|_| Status::deadline_exceeded("timed out waiting for next chunk"))??;
            let Some(info) = next else {
                return Ok(Response::new(summary(&progress, progress.finish())));
            };

            // returning drops `inbound`, so nothing after a failed chunk is read
            let chunk = match Chunk::try_from(info) {
                Ok(c) => c,
                Err(e) => return Ok(Response::new(summary(&progress, Err(e.to_string())))),
            };
            if let Err(reason) = progress.admit(&chunk) {
                return Ok(Response::new(summary(&progress, Err(reason))));
            }
            let (index, total) = (chunk.index, chunk.total_chunks);
            if let Err(reason) = self.forward(chunk.into()).await {
                return Ok(Response::new(summary(&progress, Err(reason))));
            }
            progress.forwarded();
            debug!(file_id = progress.file_id(), index, total, "forwarded chunk");
        }
    }

    type DownloadFileStream = ReceiverStream<std::result::Result<ChunkInfo, Status>>;

    async fn download_file(
        &self,
        request: Request<DownloadFileRequest>,
    ) -> std::result::Result<Response<Self::DownloadFileStream>, Status> {
        let req = request.into_inner();
        if !is_valid_file_id(&req.file_id) {
            return Err(Status::invalid_argument(format!(
                "malformed file id {:?}",
                req.file_id
            )));
        }

        // chunk 0 is fetched before answering, so an unknown file fails the call itself
        let first = self.fetch(&req.file_id, 0).await?;
        if first.chunk_index != 0 || first.total_chunks <= 0 {
            return Err(Status::data_loss(format!(
                "chunk 0 of {} has position {}/{}",
                req.file_id, first.chunk_index, first.total_chunks
            )));
        }
        let total = first.total_chunks as u32;
        info!(file_id = %req.file_id, chunks = total, "download started");

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(self.clone().relay(req.file_id, first, total, tx));
        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cos_core::new_file_id;

    fn chunk(fid: &str, index: u32, total: u32) -> Chunk {
        Chunk::new(fid, index, total, vec![index as u8])
    }

    #[test]
    fn accepts_contiguous_upload() {
        let fid = new_file_id().unwrap();
        let mut p = UploadProgress::default();
        for i in 0..3 {
            p.admit(&chunk(&fid, i, 3)).unwrap();
            p.forwarded();
        }
        assert_eq!(p.finish(), Ok(3));
        assert_eq!(p.file_id(), fid);
    }

    #[test]
    fn rejects_gap_and_reorder() {
        let fid = new_file_id().unwrap();
        let mut p = UploadProgress::default();
        p.admit(&chunk(&fid, 0, 3)).unwrap();
        p.forwarded();
        assert!(p.admit(&chunk(&fid, 2, 3)).is_err());

        let mut q = UploadProgress::default();
        assert!(q.admit(&chunk(&fid, 1, 3)).is_err());
    }

    #[test]
    fn rejects_second_file_and_changed_total() {
        let fid = new_file_id().unwrap();
        let other = new_file_id().unwrap();
        let mut p = UploadProgress::default();
        p.admit(&chunk(&fid, 0, 2)).unwrap();
        p.forwarded();
        assert!(p.admit(&chunk(&other, 1, 2)).is_err());
        assert!(p.admit(&chunk(&fid, 1, 5)).is_err());
    }

    #[test]
    fn short_or_empty_stream_fails() {
        assert!(UploadProgress::default().finish().is_err());

        let fid = new_file_id().unwrap();
        let mut p = UploadProgress::default();
        p.admit(&chunk(&fid, 0, 2)).unwrap();
        p.forwarded();
        let err = p.finish().unwrap_err();
        assert!(err.contains("1 of 2"), "{err}");
    }

    #[test]
    fn failure_summary_keeps_file_id() {
        let fid = new_file_id().unwrap();
        let mut p = UploadProgress::default();
        p.admit(&chunk(&fid, 0, 2)).unwrap();
        let s = summary(&p, Err("boom".into()));
        assert!(!s.success);
        assert_eq!(s.file_id, fid);
        assert_eq!(s.message, "boom");
    }
}
