use std::path::Path;

use cos_grpc::config::{self, ClientConfig};
use cos_grpc::error::Result;
use cos_grpc::ObjectClient;
use tracing::info;

use crate::presentation::cli::Cli;

/// Config file (or defaults) with command-line overrides applied.
pub fn client_config(cli: &Cli) -> Result<ClientConfig> {
    let mut cfg: ClientConfig = config::load(cli.config.as_deref())?;
    if let Some(g) = &cli.gateway {
        cfg.gateway = g.clone();
    }
    if let Some(n) = cli.chunk_size {
        cfg.chunk_size = n;
    }
    Ok(cfg)
}

/// Prints the new file id on stdout so scripts can capture it.
pub async fn handle_upload(cfg: &ClientConfig, path: &Path) -> Result<()> {
    let client = ObjectClient::connect(cfg).await?;
    let summary = client.upload(path).await?;
    info!(
        file_id = %summary.file_id,
        chunks = summary.chunks,
        bytes = summary.bytes,
        "{}",
        summary.message
    );
    println!("{}", summary.file_id);
    Ok(())
}

pub async fn handle_download(cfg: &ClientConfig, file_id: &str, path: &Path) -> Result<()> {
    let client = ObjectClient::connect(cfg).await?;
    let bytes = client.download(file_id, path).await?;
    eprintln!("downloaded {file_id} -> {} ({bytes} bytes)", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{ "gateway": "http://10.0.0.1:9000", "chunk_size": 4096 }"#,
        )
        .unwrap();
        let p = path.to_str().unwrap();

        let cli = Cli::try_parse_from(["cosdev", "--config", p]).unwrap();
        let cfg = client_config(&cli).unwrap();
        assert_eq!(cfg.gateway, "http://10.0.0.1:9000");
        assert_eq!(cfg.chunk_size, 4096);

        let cli = Cli::try_parse_from(["cosdev", "--config", p, "--chunk-size", "100"]).unwrap();
        let cfg = client_config(&cli).unwrap();
        assert_eq!(cfg.gateway, "http://10.0.0.1:9000");
        assert_eq!(cfg.chunk_size, 100);
    }

    #[test]
    fn defaults_without_flags() {
        let cli = Cli::try_parse_from(["cosdev"]).unwrap();
        assert_eq!(client_config(&cli).unwrap(), ClientConfig::default());
    }
}
