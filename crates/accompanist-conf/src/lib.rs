//! Configuration loading for the accompanist tools.
//!
//! Only the CLI reads config; the library crates take plain parameter
//! structs, which the CLI fills from the sections here.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/accompanist/config.toml` (system)
//! 2. `~/.config/accompanist/config.toml` (user)
//! 3. `./accompanist.toml` (local override), or the file given on the
//!    command line
//! 4. Environment variables (`ACCOMPANIST_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! corpus_dir = "~/data/POP909"
//! pitch_table = "~/data/pitch_table.csv"
//! model_cache = "~/.cache/accompanist/models.db"
//!
//! [timing]
//! hop_size = 512
//! tightness = 100
//!
//! [model]
//! smoothing = 1.0
//! epsilon = 1e-10
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{ModelConfig, PathsConfig, TelemetryConfig, TimingConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path}: {key} must be {expected}")]
    Invalid {
        path: PathBuf,
        key: String,
        expected: String,
    },
}

/// Complete accompanist configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccompanistConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AccompanistConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` stand in for the local
    /// `./accompanist.toml`. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = AccompanistConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_from_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# accompanist configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!("corpus_dir = \"{}\"\n", self.paths.corpus_dir.display()));
        output.push_str(&format!("pitch_table = \"{}\"\n", self.paths.pitch_table.display()));
        output.push_str(&format!("model_cache = \"{}\"\n", self.paths.model_cache.display()));

        output.push_str("\n[timing]\n");
        output.push_str(&format!("frame_size = {}\n", self.timing.frame_size));
        output.push_str(&format!("hop_size = {}\n", self.timing.hop_size));
        output.push_str(&format!("min_bpm = {:?}\n", self.timing.min_bpm));
        output.push_str(&format!("max_bpm = {:?}\n", self.timing.max_bpm));
        output.push_str(&format!("tightness = {:?}\n", self.timing.tightness));

        output.push_str("\n[model]\n");
        output.push_str(&format!("smoothing = {:?}\n", self.model.smoothing));
        output.push_str(&format!("epsilon = {:?}\n", self.model.epsilon));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}
