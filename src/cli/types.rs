//! CLI type definitions: the `Cli`/`Commands` derive split for the
//! four-verb operator surface described in spec.md §2.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_SPEC_CONFIG_PATH, DEFAULT_USER_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "nodewatch")]
#[command(about = "Node-resident GPU/HPC cluster health-check agent", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the operational user config file.
    #[arg(long, global = true, default_value = DEFAULT_USER_CONFIG_PATH)]
    pub user_config: PathBuf,

    /// Path to the declarative spec config file.
    #[arg(long, global = true, default_value = DEFAULT_SPEC_CONFIG_PATH)]
    pub spec_config: PathBuf,

    /// Node hostname to report as. Defaults to the OS hostname.
    #[arg(long, global = true)]
    pub node: Option<String>,

    /// Log as pretty text instead of JSON.
    #[arg(long, global = true)]
    pub pretty_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Runs the daemon: starts every selected component's scheduler loop
    /// and blocks until a shutdown signal arrives.
    Run {
        /// Components to force-enable regardless of auto-detection.
        #[arg(long, value_delimiter = ',')]
        enable: Vec<String>,

        /// Components to exclude even if auto-detected.
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,
    },

    /// Runs a single component's health check once and prints its result.
    Check {
        /// Component name (e.g. `cpu`, `dmesg`, `nvidia`).
        component: String,
    },

    /// Runs every selected component's health check once and prints a
    /// summary table.
    All {
        #[arg(long, value_delimiter = ',')]
        enable: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,
    },

    /// Prints version information and exits.
    Version,
}
