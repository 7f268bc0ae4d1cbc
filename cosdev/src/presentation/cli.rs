use clap::{Parser, ValueEnum};
use cos_grpc::error::{Error, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "cosdev object store client", long_about = None)]
pub struct Cli {
    /// Operation to run
    #[arg(long, value_enum)]
    pub op: Option<Op>,

    /// Local file: upload source, or download destination
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// File id printed by a previous upload (download only)
    #[arg(long = "file-id", alias = "fileid")]
    pub file_id: Option<String>,

    /// Gateway URI, e.g. http://127.0.0.1:50052
    #[arg(long)]
    pub gateway: Option<String>,

    /// Chunk size in bytes used when splitting an upload
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,

    /// JSON client config; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Op {
    Upload,
    Download,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Upload { path: PathBuf },
    Download { file_id: String, path: PathBuf },
}

impl Cli {
    /// Check the flag combination without touching the network.
    pub fn invocation(&self) -> Result<Invocation> {
        let op = self
            .op
            .ok_or_else(|| Error::Usage("--op upload|download is required".into()))?;
        let path = self
            .path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| Error::Usage("--path is required".into()))?;
        if self.chunk_size == Some(0) {
            return Err(Error::Usage("--chunk-size must be positive".into()));
        }
        match (op, &self.file_id) {
            (Op::Upload, None) => Ok(Invocation::Upload { path }),
            (Op::Upload, Some(_)) => Err(Error::Usage(
                "--file-id is only valid with --op download".into(),
            )),
            (Op::Download, Some(id)) if !id.is_empty() => Ok(Invocation::Download {
                file_id: id.clone(),
                path,
            }),
            (Op::Download, _) => Err(Error::Usage(
                "--op download requires --file-id".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cosdev").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn upload_needs_only_path() {
        let cli = parse(&["--op", "upload", "--path", "a.bin"]);
        assert_eq!(
            cli.invocation().unwrap(),
            Invocation::Upload {
                path: PathBuf::from("a.bin")
            }
        );
    }

    #[test]
    fn download_needs_file_id() {
        let cli = parse(&["--op", "download", "--path", "out.bin"]);
        assert!(matches!(cli.invocation(), Err(Error::Usage(_))));

        let cli = parse(&["--op", "download", "--path", "out.bin", "--fileid", "abc"]);
        assert_eq!(
            cli.invocation().unwrap(),
            Invocation::Download {
                file_id: "abc".into(),
                path: PathBuf::from("out.bin")
            }
        );
    }

    #[test]
    fn upload_rejects_file_id() {
        let cli = parse(&["--op", "upload", "--path", "a", "--file-id", "abc"]);
        assert!(matches!(cli.invocation(), Err(Error::Usage(_))));
    }

    #[test]
    fn missing_op_or_path_is_usage_error() {
        assert!(matches!(
            parse(&["--path", "a"]).invocation(),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            parse(&["--op", "upload"]).invocation(),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            parse(&["--op", "upload", "--path", "a", "--chunk-size", "0"]).invocation(),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn unknown_op_fails_to_parse() {
        assert!(Cli::try_parse_from(["cosdev", "--op", "delete", "--path", "a"]).is_err());
    }
}
