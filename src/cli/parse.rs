//! CLI parse: clap types for eqs. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// eqs CLI - run environment queries against a scene file
#[derive(Parser)]
#[command(name = "eqs")]
#[command(about = "Generate, test, and rank spatial candidates against a scene")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (config/ is read from here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a query template against a scene and print the ranked items
    Run {
        /// Template file (.toml or .json)
        #[arg(long)]
        template: PathBuf,

        /// Scene file (.toml)
        #[arg(long)]
        scene: PathBuf,

        /// Name of the scene entity issuing the query
        #[arg(long, conflicts_with = "at")]
        querier: Option<String>,

        /// Static querier location as x,y,z
        #[arg(long, value_delimiter = ',', num_args = 3)]
        at: Option<Vec<f32>>,

        /// Named parameter override, NAME=VALUE (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,

        /// Per-tick budget in microseconds (defaults to manager.tick_budget_us)
        #[arg(long)]
        budget_us: Option<u64>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Build a template and print its options and tests
    Validate {
        #[arg(long)]
        template: PathBuf,
    },
    /// Print a template's named parameters and their defaults
    Params {
        #[arg(long)]
        template: PathBuf,
    },
}
