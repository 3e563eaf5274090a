//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::inspect::InspectArgs;
use crate::commands::process::ProcessArgs;

/// Batch processor for IDE interaction logs.
///
/// Cleans archived IDE events, derives activity intervals from them and
/// merges fragmented completion events.
#[derive(Debug, Parser)]
#[command(name = "fp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full pipeline over every archive and write the results.
    Process(ProcessArgs),

    /// Show how many events survive each cleaning stage.
    Inspect(InspectArgs),
}
