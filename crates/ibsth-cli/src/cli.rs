//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Output format for readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "ibsth")]
#[command(author, version, about = "CLI for IBS-TH temperature/humidity sensors", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding the address cache
    #[arg(long, global = true, env = "IBSTH_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print readings from nearby sensors until interrupted
    Watch {
        /// Output format (overrides config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Stop after this many readings (0 for unlimited)
        #[arg(short, long, default_value = "0")]
        count: u32,

        /// Connect timeout for address resolution, in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Report only the first advertisement per sensor
        #[arg(long)]
        no_duplicates: bool,
    },
}
