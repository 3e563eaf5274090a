//! Configuration loading and mapping onto the processing pipeline.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use fp_core::filters::{
    DropCommands, DropKinds, DropUntimed, FillMissingTermination, ResetEditTermination,
    RewriteDocumentClose, TimeTestResults,
};
use fp_core::{
    EventType, FilterChain, OrderingMode, Pipeline, PipelineConfig, TransformerConfig,
    TransformerRegistry,
};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Where `fp process` writes its output when `--out` is not given.
    pub output_dir: PathBuf,

    /// Idle gap after which user and file activity ends.
    /// Default: 16000 (16 seconds).
    pub activity_timeout_ms: u32,

    /// `sort` re-orders events by trigger time, `strict` fails units that
    /// are out of order.
    pub ordering: OrderingMode,

    /// Drop events without a trigger time before anything else.
    pub drop_untimed: bool,

    /// Repair termination times, time test results and rewrite document
    /// closes into close commands.
    pub fix_events: bool,

    /// Command ids removed from every unit.
    pub ignored_commands: Vec<String>,

    /// Event kinds removed from every unit, e.g. `["activity"]`.
    pub ignored_kinds: Vec<EventType>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            output_dir: data_dir.join("out"),
            activity_timeout_ms: 16_000, // 16 seconds
            ordering: OrderingMode::Sort,
            drop_untimed: true,
            fix_events: true,
            ignored_commands: Vec::new(),
            ignored_kinds: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (FP_*)
        figment = figment.merge(Env::prefixed("FP_"));

        figment.extract()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            ordering: self.ordering,
            transformers: TransformerConfig {
                activity_timeout: TimeDelta::milliseconds(i64::from(self.activity_timeout_ms)),
            },
        }
    }

    pub fn filter_chain(&self) -> FilterChain {
        let mut chain = FilterChain::new();
        if self.drop_untimed {
            chain.push(DropUntimed);
        }
        if self.fix_events {
            chain
                .push(ResetEditTermination)
                .push(FillMissingTermination)
                .push(TimeTestResults)
                .push(RewriteDocumentClose);
        }
        if !self.ignored_commands.is_empty() {
            chain.push(DropCommands::new(self.ignored_commands.iter().cloned()));
        }
        if !self.ignored_kinds.is_empty() {
            chain.push(DropKinds::new(self.ignored_kinds.iter().copied()));
        }
        chain
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.filter_chain(),
            TransformerRegistry::with_defaults(),
            self.pipeline_config(),
        )
    }
}

/// Returns the platform-specific config directory for fp.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("fp"))
}

/// Returns the platform-specific data directory for fp.
///
/// On Linux: `~/.local/share/fp`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("fp"))
}
