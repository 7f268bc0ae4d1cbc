//! Listener plumbing shared by the binaries and the integration tests.

use std::future::Future;
use std::sync::Arc;

use cos_core::{ChunkIndex, ChunkStore};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use crate::chunk_server::ChunkServer;
use crate::error::Result;
use crate::gateway::Gateway;

pub async fn serve_chunk_store<I, F>(
    listener: TcpListener,
    store: Arc<ChunkStore<I>>,
    max_chunk_size: usize,
    shutdown: F,
) -> Result<()>
where
    I: ChunkIndex,
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "chunk server listening");
    Server::builder()
        .add_service(ChunkServer::new(store).into_service(max_chunk_size))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;
    info!("chunk server stopped");
    Ok(())
}

pub async fn serve_gateway<F>(listener: TcpListener, gateway: Gateway, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "gateway listening");
    Server::builder()
        .add_service(gateway.into_service())
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await?;
    info!("gateway stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // no signal handler available; run until killed
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
