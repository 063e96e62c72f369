//! Config file discovery, loading, and environment variable overlay.

use crate::{AccompanistConfig, ConfigError};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/accompanist/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("accompanist/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("accompanist.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and lay its values over `config`.
pub fn load_from_file(config: &mut AccompanistConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Lay the keys present in `contents` over `config`. Keys a file leaves out
/// keep whatever an earlier layer set.
pub fn apply_toml(
    config: &mut AccompanistConfig,
    contents: &str,
    path: &Path,
) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let invalid = |key: &str, expected: &str| ConfigError::Invalid {
        path: path.to_path_buf(),
        key: key.to_string(),
        expected: expected.to_string(),
    };

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("corpus_dir") {
            let v = v.as_str().ok_or_else(|| invalid("paths.corpus_dir", "a path"))?;
            config.paths.corpus_dir = expand_path(v);
        }
        if let Some(v) = paths.get("pitch_table") {
            let v = v.as_str().ok_or_else(|| invalid("paths.pitch_table", "a path"))?;
            config.paths.pitch_table = expand_path(v);
        }
        if let Some(v) = paths.get("model_cache") {
            let v = v.as_str().ok_or_else(|| invalid("paths.model_cache", "a path"))?;
            config.paths.model_cache = expand_path(v);
        }
    }

    if let Some(timing) = table.get("timing").and_then(|v| v.as_table()) {
        if let Some(v) = timing.get("frame_size") {
            config.timing.frame_size = positive_int(v).ok_or_else(|| invalid("timing.frame_size", "a positive integer"))?;
        }
        if let Some(v) = timing.get("hop_size") {
            config.timing.hop_size = positive_int(v).ok_or_else(|| invalid("timing.hop_size", "a positive integer"))?;
        }
        if let Some(v) = timing.get("min_bpm") {
            config.timing.min_bpm = number(v).ok_or_else(|| invalid("timing.min_bpm", "a number"))?;
        }
        if let Some(v) = timing.get("max_bpm") {
            config.timing.max_bpm = number(v).ok_or_else(|| invalid("timing.max_bpm", "a number"))?;
        }
        if let Some(v) = timing.get("tightness") {
            config.timing.tightness = number(v).ok_or_else(|| invalid("timing.tightness", "a number"))?;
        }
    }

    if let Some(model) = table.get("model").and_then(|v| v.as_table()) {
        if let Some(v) = model.get("smoothing") {
            config.model.smoothing = number(v).ok_or_else(|| invalid("model.smoothing", "a number"))?;
        }
        if let Some(v) = model.get("epsilon") {
            config.model.epsilon = number(v).ok_or_else(|| invalid("model.epsilon", "a number"))?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level") {
            let v = v.as_str().ok_or_else(|| invalid("telemetry.log_level", "a string"))?;
            config.telemetry.log_level = v.to_string();
        }
    }

    Ok(())
}

/// TOML integers are accepted where floats are expected (`tightness = 100`).
fn number(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn positive_int(value: &toml::Value) -> Option<usize> {
    value
        .as_integer()
        .filter(|i| *i > 0)
        .and_then(|i| usize::try_from(i).ok())
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut AccompanistConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Same as [`apply_env_overrides`], reading variables through `lookup`.
pub fn apply_overrides_from(
    config: &mut AccompanistConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("ACCOMPANIST_CORPUS_DIR") {
        config.paths.corpus_dir = expand_path(&v);
        sources.env_overrides.push("ACCOMPANIST_CORPUS_DIR".to_string());
    }
    if let Some(v) = lookup("ACCOMPANIST_PITCH_TABLE") {
        config.paths.pitch_table = expand_path(&v);
        sources.env_overrides.push("ACCOMPANIST_PITCH_TABLE".to_string());
    }
    if let Some(v) = lookup("ACCOMPANIST_MODEL_CACHE") {
        config.paths.model_cache = expand_path(&v);
        sources.env_overrides.push("ACCOMPANIST_MODEL_CACHE".to_string());
    }

    if let Some(v) = lookup("ACCOMPANIST_HOP_SIZE") {
        if let Ok(hop) = v.parse() {
            config.timing.hop_size = hop;
            sources.env_overrides.push("ACCOMPANIST_HOP_SIZE".to_string());
        }
    }
    if let Some(v) = lookup("ACCOMPANIST_SMOOTHING") {
        if let Ok(smoothing) = v.parse() {
            config.model.smoothing = smoothing;
            sources.env_overrides.push("ACCOMPANIST_SMOOTHING".to_string());
        }
    }

    if let Some(v) = lookup("ACCOMPANIST_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("ACCOMPANIST_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
        PathBuf::from(path)
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        let (var_name, rest) = stripped.split_once('/').unwrap_or((stripped, ""));
        match env::var(var_name) {
            Ok(value) if rest.is_empty() => PathBuf::from(value),
            Ok(value) => PathBuf::from(value).join(rest),
            Err(_) => PathBuf::from(path),
        }
    } else {
        PathBuf::from(path)
    }
}
