#![forbid(unsafe_code)]

use std::future::Future;
use std::time::Duration;

pub mod chunk_server;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod proto;
pub mod server;
pub mod telemetry;

pub use chunk_server::ChunkServer;
pub use client::{ObjectClient, UploadSummary};
pub use config::{ChunkServerConfig, ClientConfig, GatewayConfig};
pub use error::{Error, Result};
pub use gateway::Gateway;

/// Await `fut`, giving up after `limit` when one is set.
pub(crate) async fn within<F: Future>(
    limit: Option<Duration>,
    fut: F,
) -> std::result::Result<F::Output, tokio::time::error::Elapsed> {
    match limit {
        Some(d) => tokio::time::timeout(d, fut).await,
        None => Ok(fut.await),
    }
}
