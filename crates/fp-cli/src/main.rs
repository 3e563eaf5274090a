use std::io;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fp_cli::commands::{inspect, process};
use fp_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match &cli.command {
        Some(Commands::Process(args)) => {
            let summary = process::run(&mut io::stdout(), args, &config)?;
            if !summary.failed.is_empty() {
                bail!(
                    "{} of {} units failed",
                    summary.failed.len(),
                    summary.failed.len() + summary.processed.len()
                );
            }
        }
        Some(Commands::Inspect(args)) => {
            inspect::run(&mut io::stdout(), args, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
