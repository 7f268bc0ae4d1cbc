//! Process configuration. Every field has a default matching the stock
//! single-host deployment; a JSON file can override any subset.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use cos_core::{DEFAULT_CHUNK_SIZE, StoreConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Room for protobuf framing on top of the raw payload.
const FRAME_OVERHEAD: usize = 64 * 1024;

const DEFAULT_CHUNK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(flatten)]
    pub store: StoreConfig,
}

impl Default for ChunkServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 50051)),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Upstream chunk server, e.g. `http://127.0.0.1:50051`.
    pub chunk_server: String,
    pub max_chunk_size: usize,
    /// Limit for each forwarded chunk call; 0 waits forever.
    pub chunk_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 50052)),
            chunk_server: "http://127.0.0.1:50051".into(),
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_timeout_secs: DEFAULT_CHUNK_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    pub fn chunk_timeout(&self) -> Option<Duration> {
        secs(self.chunk_timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub gateway: String,
    /// Split size for uploads.
    pub chunk_size: usize,
    /// Largest stored chunk this client accepts on download, whatever it uploads with.
    pub max_chunk_size: usize,
    /// Limit for receiving each chunk of a download; 0 waits forever.
    pub chunk_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway: "http://127.0.0.1:50052".into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_timeout_secs: DEFAULT_CHUNK_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Per-message limit covering both outgoing and incoming chunks.
    pub fn message_limit(&self) -> usize {
        message_limit(self.chunk_size.max(self.max_chunk_size))
    }

    pub fn chunk_timeout(&self) -> Option<Duration> {
        secs(self.chunk_timeout_secs)
    }
}

fn secs(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n))
}

pub fn connect_timeout(n: u64) -> Duration {
    Duration::from_secs(n.max(1))
}

/// gRPC message size limit for chunks of up to `max_chunk_size` bytes.
pub fn message_limit(max_chunk_size: usize) -> usize {
    max_chunk_size.saturating_add(FRAME_OVERHEAD)
}

/// Load `T` from a JSON file, or defaults when no file is given.
pub fn load<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defaults_without_file() {
        let cfg: GatewayConfig = load(None).unwrap();
        assert_eq!(cfg, GatewayConfig::default());
        assert_eq!(cfg.chunk_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chunkserver.json");
        std::fs::write(
            &path,
            r#"{ "listen_addr": "127.0.0.1:6000", "chunk_root": "/srv/chunks" }"#,
        )
        .unwrap();

        let cfg: ChunkServerConfig = load(Some(&path)).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:6000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.store.chunk_root, PathBuf::from("/srv/chunks"));
        assert_eq!(cfg.store.index_dir, PathBuf::from("data/index"));
        assert_eq!(cfg.store.max_chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let cfg = ClientConfig {
            chunk_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(cfg.chunk_timeout(), None);
    }

    #[test]
    fn small_split_size_keeps_download_limit() {
        let cfg = ClientConfig {
            chunk_size: 1000,
            ..Default::default()
        };
        assert_eq!(cfg.message_limit(), message_limit(DEFAULT_CHUNK_SIZE));

        let big = ClientConfig {
            chunk_size: 2 * DEFAULT_CHUNK_SIZE,
            ..Default::default()
        };
        assert_eq!(big.message_limit(), message_limit(2 * DEFAULT_CHUNK_SIZE));
    }

    #[test]
    fn bad_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load::<ClientConfig>(Some(&path)),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            load::<ClientConfig>(Some(&dir.path().join("missing.json"))),
            Err(Error::Config(_))
        ));
    }
}
