use std::time::Duration;

use cos_core::CosError;
use thiserror::Error;
use tonic::Status;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CosError),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("RPC failed ({}): {}", .0.code(), .0.message())]
    Rpc(#[from] Status),

    #[error("Timed out after {1:?} waiting for {0}")]
    Timeout(&'static str, Duration),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// How a storage-side failure is reported to an RPC caller.
pub fn to_status(e: &CosError) -> Status {
    let msg = e.to_string();
    match e {
        CosError::NotFound(_) => Status::not_found(msg),
        CosError::InvalidChunk(_) => Status::invalid_argument(msg),
        CosError::Inconsistent(_) | CosError::MissingChunk { .. } => Status::data_loss(msg),
        CosError::EmptyFile(_) => Status::failed_precondition(msg),
        CosError::Storage(_) | CosError::Io(_) => Status::internal(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn storage_errors_map_to_status_codes() {
        assert_eq!(to_status(&CosError::NotFound("c".into())).code(), Code::NotFound);
        assert_eq!(
            to_status(&CosError::invalid("bad id")).code(),
            Code::InvalidArgument
        );
        assert_eq!(
            to_status(&CosError::Inconsistent("gone".into())).code(),
            Code::DataLoss
        );
        assert_eq!(to_status(&CosError::storage("full")).code(), Code::Internal);
    }
}
