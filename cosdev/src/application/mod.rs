pub mod handlers;

use std::process::ExitCode;

use crate::presentation::cli::{Cli, Invocation};
use clap::{CommandFactory, Parser};
use cos_grpc::error::Error;
use cos_grpc::telemetry;

pub async fn run() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();

    let invocation = match cli.invocation() {
        Ok(i) => i,
        Err(Error::Usage(msg)) => {
            let _ = Cli::command().print_help();
            eprintln!("\nerror: {msg}");
            return ExitCode::from(2);
        }
        Err(e) => {
            eprintln!("cosdev: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match handlers::client_config(&cli) {
        Ok(cfg) => match invocation {
            Invocation::Upload { path } => handlers::handle_upload(&cfg, &path).await,
            Invocation::Download { file_id, path } => {
                handlers::handle_download(&cfg, &file_id, &path).await
            }
        },
        Err(e) => Err(e),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cosdev: {e}");
            ExitCode::FAILURE
        }
    }
}
