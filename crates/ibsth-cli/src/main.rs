use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;

use cli::{Cli, Commands};
use commands::{WatchArgs, cmd_watch};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let cache_dir = config.resolve_cache_dir(cli.cache_dir);
    tracing::debug!("Address cache directory: {}", cache_dir.display());

    match cli.command {
        Commands::Watch {
            format,
            count,
            timeout,
            no_duplicates,
        } => {
            cmd_watch(WatchArgs {
                cache_dir,
                count,
                format: config.resolve_format(format),
                options: config.session_options(timeout, no_duplicates),
                quiet: cli.quiet,
            })
            .await
        }
    }
}
