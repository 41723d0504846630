//! MailChimp loader binary.
//!
//! Reads rows as JSON lines and bulk-subscribes them to a MailChimp list through the sink,
//! with configuration loaded from files and `APP_`-prefixed environment variables.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mailchimp_config::shared::{LoaderConfig, SinkConfigWithoutSecrets};
use mailchimp_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_loader_config;
use crate::core::start_loader_with_config;
use crate::error::{LoaderError, LoaderResult};

mod config;
mod core;
mod error;
mod input;

#[derive(Debug, Parser)]
#[command(name = "mailchimp-loader", version, about)]
struct Args {
    /// JSON-lines file to read rows from (default: stdin)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Directory holding `base` and environment configuration files (default: ./configuration)
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, initializes tracing, starts the async runtime and runs the load.
fn run(args: Args) -> LoaderResult<()> {
    let loader_config = load_loader_config(args.config_dir.as_deref())?;

    init_tracing(env!("CARGO_BIN_NAME")).map_err(LoaderError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(loader_config, args.input))?;

    Ok(())
}

async fn async_main(loader_config: LoaderConfig, input: Option<PathBuf>) -> LoaderResult<()> {
    info!(
        sink = ?SinkConfigWithoutSecrets::from(&loader_config.sink),
        dry_run = loader_config.dry_run,
        input = ?input,
        "starting loader"
    );

    if let Err(err) = start_loader_with_config(loader_config, input.as_deref()).await {
        error!("{err}");

        return Err(err);
    }

    Ok(())
}
