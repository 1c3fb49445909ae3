/// Configuration for the history engine: defaults, JSON load/save, and path resolution.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of committed actions kept. 0 keeps everything.
const DEFAULT_MAX_STEPS: usize = 0;

/// Time window in milliseconds within which a same-named action counts as
/// a continuation of the previous one.
const DEFAULT_MERGE_WINDOW_MS: u64 = 800;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "UNDOREDO_CONFIG";

/// Configuration for a [`History`](crate::History).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Max committed actions kept in the history (0 = unlimited).
    pub max_steps: usize,
    /// Merge window in milliseconds, consulted by `is_mergeable_with_tip`.
    pub merge_window_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            merge_window_ms: DEFAULT_MERGE_WINDOW_MS,
        }
    }
}

impl HistoryConfig {
    /// Loads config from `path`, creating a default file if it doesn't exist.
    ///
    /// A file that exists but can't be read or parsed yields defaults and is
    /// left untouched.
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Falling back to default history config: {e:#}"),
            }
            return Self::default();
        }

        let config = Self::default();
        if let Err(e) = config.save(path) {
            tracing::warn!("Failed to create default config at {}: {e:#}", path.display());
        }
        config
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    /// Saves config to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

/// Resolves the config file path.
///
/// Resolution order:
/// 1. `UNDOREDO_CONFIG` environment variable
/// 2. `undoredo.json` next to the executable
pub fn resolve_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    exe.parent().unwrap_or(Path::new(".")).join("undoredo.json")
}
