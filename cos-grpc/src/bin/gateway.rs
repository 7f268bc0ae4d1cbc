use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cos_grpc::config::{self, GatewayConfig};
use cos_grpc::error::Result;
use cos_grpc::server::{serve_gateway, shutdown_signal};
use cos_grpc::{Gateway, telemetry};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about = "cos routing gateway", long_about = None)]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Upstream chunk server URI
    #[arg(long = "chunk-server")]
    chunk_server: Option<String>,

    #[arg(long = "max-chunk-size")]
    max_chunk_size: Option<usize>,

    /// Per-chunk forwarding timeout in seconds (0 = none)
    #[arg(long = "chunk-timeout")]
    chunk_timeout_secs: Option<u64>,
}

fn resolve(args: Args) -> Result<GatewayConfig> {
    let mut cfg: GatewayConfig = config::load(args.config.as_deref())?;
    if let Some(a) = args.listen {
        cfg.listen_addr = a;
    }
    if let Some(u) = args.chunk_server {
        cfg.chunk_server = u;
    }
    if let Some(n) = args.max_chunk_size {
        cfg.max_chunk_size = n;
    }
    if let Some(s) = args.chunk_timeout_secs {
        cfg.chunk_timeout_secs = s;
    }
    Ok(cfg)
}

async fn run(cfg: GatewayConfig) -> Result<()> {
    let gateway = Gateway::connect(&cfg)?;
    let listener = TcpListener::bind(cfg.listen_addr).await?;
    serve_gateway(listener, gateway, shutdown_signal()).await
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
        upstream = %cfg.chunk_server,
        "starting gateway"
    );
    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "gateway failed");
            ExitCode::FAILURE
        }
    }
}
