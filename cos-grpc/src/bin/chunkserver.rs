use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cos_core::ChunkStore;
use cos_grpc::config::{self, ChunkServerConfig};
use cos_grpc::error::Result;
use cos_grpc::server::{serve_chunk_store, shutdown_signal};
use cos_grpc::telemetry;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about = "cos chunk storage node", long_about = None)]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Directory holding the chunk index database
    #[arg(long = "index-dir")]
    index_dir: Option<PathBuf>,

    /// Directory chunk files are written under, one subdirectory per file id
    #[arg(long = "chunk-root")]
    chunk_root: Option<PathBuf>,

    #[arg(long = "max-chunk-size")]
    max_chunk_size: Option<usize>,
}

fn resolve(args: Args) -> Result<ChunkServerConfig> {
    let mut cfg: ChunkServerConfig = config::load(args.config.as_deref())?;
    if let Some(a) = args.listen {
        cfg.listen_addr = a;
    }
    if let Some(d) = args.index_dir {
        cfg.store.index_dir = d;
    }
    if let Some(d) = args.chunk_root {
        cfg.store.chunk_root = d;
    }
    if let Some(n) = args.max_chunk_size {
        cfg.store.max_chunk_size = n;
    }
    Ok(cfg)
}

async fn run(cfg: ChunkServerConfig) -> Result<()> {
    let store = Arc::new(ChunkStore::open(&cfg.store).await?);

    let served = match TcpListener::bind(cfg.listen_addr).await {
        Ok(listener) => {
            serve_chunk_store(
                listener,
                Arc::clone(&store),
                cfg.store.max_chunk_size,
                shutdown_signal(),
            )
            .await
        }
        Err(e) => Err(e.into()),
    };

    // the index is released on every path once it was opened
    match Arc::into_inner(store) {
        Some(store) => store.close().await?,
        None => warn!("chunk store still referenced at exit; index released on drop"),
    }
    served
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();
    let cfg = match resolve(Args::parse()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %cfg.listen_addr,
        "starting chunk server"
    );
    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "chunk server failed");
            ExitCode::FAILURE
        }
    }
}
