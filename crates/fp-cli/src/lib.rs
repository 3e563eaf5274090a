//! Batch processor CLI library.
//!
//! This crate provides the CLI interface and the JSONL archive adapters for
//! the processing pipeline in `fp-core`.

pub mod archive;
mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
