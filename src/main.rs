//! `nodewatchd` entry point.

use anyhow::{Context, Result};
use clap::Parser;

use nodewatch::cli::commands::{handle_all, handle_check, handle_run, handle_version};
use nodewatch::cli::{Cli, Commands};
use nodewatch::config::ConfigLoader;
use nodewatch::logging::{self, LogConfig, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        handle_version();
        return Ok(());
    }

    logging::init(&LogConfig {
        level: std::env::var("NODEWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        format: if cli.pretty_logs { LogFormat::Pretty } else { LogFormat::Json },
    });

    let node = cli
        .node
        .clone()
        .or_else(|| hostname())
        .context("could not determine node hostname; pass --node explicitly")?;

    let user_config = ConfigLoader::load_user_config(&cli.user_config).context("failed to load user config")?;
    let spec_config = ConfigLoader::load_spec_config(&cli.spec_config).context("failed to load spec config")?;

    match cli.command {
        Commands::Version => unreachable!("handled above"),
        Commands::Run { enable, ignore } => handle_run(&node, user_config, spec_config, enable, ignore).await,
        Commands::Check { component } => handle_check(&node, user_config, spec_config, &component).await,
        Commands::All { enable, ignore } => handle_all(&node, user_config, spec_config, enable, ignore).await,
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok().or_else(|| {
        std::fs::read_to_string("/etc/hostname")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}
