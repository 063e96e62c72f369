//! Config sections. Each mirrors one `[table]` of the TOML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the corpus and the model cache live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of numbered song folders, each holding `chord_midi.txt`
    /// and `<n>.mid`.
    /// Default: ~/.local/share/accompanist/corpus
    #[serde(default = "PathsConfig::default_corpus_dir")]
    pub corpus_dir: PathBuf,

    /// Per-chord pitch-class counts (`chord,C,C#,...,B`).
    /// Default: ~/.local/share/accompanist/pitch_table.csv
    #[serde(default = "PathsConfig::default_pitch_table")]
    pub pitch_table: PathBuf,

    /// SQLite file caching built corpus models.
    /// Default: ~/.cache/accompanist/models.db
    #[serde(default = "PathsConfig::default_model_cache")]
    pub model_cache: PathBuf,
}

impl PathsConfig {
    fn data_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.data_dir().join("accompanist"))
            .unwrap_or_else(|| PathBuf::from(".local/share/accompanist"))
    }

    fn default_corpus_dir() -> PathBuf {
        Self::data_dir().join("corpus")
    }

    fn default_pitch_table() -> PathBuf {
        Self::data_dir().join("pitch_table.csv")
    }

    fn default_model_cache() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.cache_dir().join("accompanist/models.db"))
            .unwrap_or_else(|| PathBuf::from(".cache/accompanist/models.db"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            corpus_dir: Self::default_corpus_dir(),
            pitch_table: Self::default_pitch_table(),
            model_cache: Self::default_model_cache(),
        }
    }
}

/// Beat tracking knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Analysis frame length in samples.
    pub frame_size: usize,
    /// Samples between onset-envelope frames.
    pub hop_size: usize,
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// How strongly beat spacing is held to the estimated period.
    pub tightness: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
            tightness: 100.0,
        }
    }
}

/// Numeric constants of the chord model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Added to every pitch-table count before normalizing.
    pub smoothing: f64,
    /// Added to every bin of a measure's pitch-class histogram.
    pub epsilon: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            smoothing: 1.0,
            epsilon: 1e-10,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive (trace, debug, info, warn, error, or per-target).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
