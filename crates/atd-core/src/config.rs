//! Configuration for the watch service
//!
//! Loaded from `<home>/.config/atd/config.toml` when present, or from an
//! explicit `--config` path. Every field has a default so an absent file is
//! equivalent to `WatchConfig::default()`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Watched directory roots
    #[serde(default)]
    pub roots: RootsConfig,
    /// Timing knobs for debounce and write stabilization
    #[serde(default)]
    pub timing: TimingConfig,
    /// Broadcast channel configuration
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// Watched directory roots.
///
/// When unset, both roots are derived from the claude root
/// (`<claude_root>/teams` and `<claude_root>/tasks`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootsConfig {
    /// Override for the teams directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams_root: Option<PathBuf>,
    /// Override for the tasks directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_root: Option<PathBuf>,
}

impl RootsConfig {
    /// Resolve the teams root against a claude root.
    pub fn teams_root(&self, claude_root: &Path) -> PathBuf {
        self.teams_root
            .clone()
            .unwrap_or_else(|| claude_root.join("teams"))
    }

    /// Resolve the tasks root against a claude root.
    pub fn tasks_root(&self, claude_root: &Path) -> PathBuf {
        self.tasks_root
            .clone()
            .unwrap_or_else(|| claude_root.join("tasks"))
    }
}

/// Timing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Broadcast debounce quiet period in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Interval between write-stabilization metadata probes in milliseconds
    #[serde(default = "default_stability_ms")]
    pub stability_ms: u64,
    /// Maximum stabilization probes before the file is read anyway
    #[serde(default = "default_stability_max_checks")]
    pub stability_max_checks: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            stability_ms: default_stability_ms(),
            stability_max_checks: default_stability_max_checks(),
        }
    }
}

/// Broadcast channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Per-observer event buffer; slow observers past this lag miss events
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_stability_ms() -> u64 {
    100
}

fn default_stability_max_checks() -> u32 {
    50
}

fn default_capacity() -> usize {
    256
}

impl WatchConfig {
    /// Load configuration from an explicit path, or from the default
    /// location under `home` when `path` is `None`.
    ///
    /// A missing default file yields `WatchConfig::default()`; a missing
    /// explicit path is an error.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read (explicit path only)
    /// or fails to parse as TOML.
    pub fn load(path: Option<&Path>, home: &Path) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (home.join(".config/atd/config.toml"), false),
        };

        if !path.exists() && !required {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
