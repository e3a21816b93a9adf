pub mod ai;
pub mod batch;
pub mod commands;
pub mod conversion;
pub mod formats;
pub mod jobs;
pub mod models;
pub mod settings;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use commands::Cli;

pub fn run() -> ExitCode {
    // A .env next to the binary or one level up (when run from a subdirectory)
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }

    // Default: warn for dependencies, info for run summaries.
    // Use RUST_LOG=maybe_f2_lib=debug for per-entry logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,maybe_f2_lib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(commands::dispatch(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
