use std::path::{Path, PathBuf};
use std::time::Duration;

use cos_core::{Chunk, CosError, Splitter, merge};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

use crate::config::{ClientConfig, connect_timeout};
use crate::error::{Error, Result};
use crate::proto::object_service_client::ObjectServiceClient;
use crate::proto::{ChunkInfo, DownloadFileRequest};
use crate::within;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSummary {
    pub file_id: String,
    pub chunks: u32,
    pub bytes: u64,
    pub message: String,
}

/// Talks to a gateway's `ObjectService`.
#[derive(Clone)]
pub struct ObjectClient {
    inner: ObjectServiceClient<Channel>,
    chunk_size: usize,
    chunk_timeout: Option<Duration>,
}

impl ObjectClient {
    pub async fn connect(cfg: &ClientConfig) -> Result<Self> {
        let channel = Endpoint::from_shared(cfg.gateway.clone())?
            .connect_timeout(connect_timeout(cfg.connect_timeout_secs))
            .connect()
            .await?;
        Ok(Self::new(channel, cfg))
    }

    pub fn new(channel: Channel, cfg: &ClientConfig) -> Self {
        let limit = cfg.message_limit();
        Self {
            inner: ObjectServiceClient::new(channel)
                .max_decoding_message_size(limit)
                .max_encoding_message_size(limit),
            chunk_size: cfg.chunk_size,
            chunk_timeout: cfg.chunk_timeout(),
        }
    }

    /// Split `path` and stream it through the gateway.
    ///
    /// Chunks are read one at a time on a blocking thread and handed over a
    /// channel of capacity one, so at most a couple of chunks are in memory.
    pub async fn upload(&self, path: &Path) -> Result<UploadSummary> {
        let splitter = Splitter::open(path, self.chunk_size)?;
        if splitter.total_chunks() == 0 {
            return Err(CosError::EmptyFile(path.to_path_buf()).into());
        }
        let file_id = splitter.file_id().to_string();
        let total = splitter.total_chunks();
        let bytes = splitter.file_size();
        info!(path = %path.display(), file_id = %file_id, chunks = total, "upload started");

        let (tx, rx) = mpsc::channel::<ChunkInfo>(1);
        let producer = tokio::task::spawn_blocking(move || -> cos_core::Result<u32> {
            let mut sent = 0;
            for chunk in splitter {
                let chunk = chunk?;
                let (index, total) = (chunk.index, chunk.total_chunks);
                // the gateway hung up; its summary says why
                if tx.blocking_send(chunk.into()).is_err() {
                    break;
                }
                debug!(index, total, "chunk queued");
                sent += 1;
            }
            Ok(sent)
        });

        let mut client = self.inner.clone();
        let outcome = client.upload_file(ReceiverStream::new(rx)).await;
        let sent = producer
            .await
            .map_err(|e| Error::Upload(format!("splitter task failed: {e}")))??;

        let resp = outcome?.into_inner();
        if !resp.success {
            return Err(Error::Upload(resp.message));
        }
        info!(file_id = %resp.file_id, chunks = sent, "upload acknowledged");
        Ok(UploadSummary {
            file_id: resp.file_id,
            chunks: total,
            bytes,
            message: resp.message,
        })
    }

    /// Fetch every chunk of `file_id` and reassemble it at `dest`.
    pub async fn download(&self, file_id: &str, dest: &Path) -> Result<u64> {
        info!(file_id, dest = %dest.display(), "download started");
        let mut client = self.inner.clone();
        let mut inbound = client
            .download_file(DownloadFileRequest {
                file_id: file_id.to_string(),
                save_path: dest.display().to_string(),
            })
            .await?
            .into_inner();

        let mut chunks: Vec<Chunk> = Vec::new();
        loop {
            let next = within(self.chunk_timeout, inbound.message())
                .await
                .map_err(|_| {
                    Error::Timeout("next chunk", self.chunk_timeout.unwrap_or_default())
                })??;
            let Some(info) = next else { break };
            let chunk = Chunk::try_from(info)?;
            if chunk.file_id != file_id {
                return Err(CosError::invalid(format!(
                    "gateway sent chunk {} for another file",
                    chunk.chunk_id
                ))
                .into());
            }
            debug!(index = chunk.index, total = chunk.total_chunks, "chunk received");
            chunks.push(chunk);
        }

        let received = chunks.len();
        let out: PathBuf = dest.to_path_buf();
        let written = tokio::task::spawn_blocking(move || merge(&out, chunks))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("merge task failed: {e}"))))??;
        info!(file_id, chunks = received, bytes = written, "download complete");
        Ok(written)
    }
}
