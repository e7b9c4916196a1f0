//! Canonical home directory resolution for atd
//!
//! Single source of truth for home directory resolution across both atd
//! crates. Supports custom deployments and testing via the `ATD_HOME`
//! environment variable.
//!
//! # Precedence
//!
//! 1. `ATD_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the home directory for atd operations.
///
/// # Errors
///
/// Returns an error if `ATD_HOME` is not set and the platform home
/// directory cannot be determined via `dirs::home_dir()`.
pub fn get_home_dir() -> Result<PathBuf> {
    // Check ATD_HOME first (useful for testing and custom deployments)
    if let Ok(home) = std::env::var("ATD_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}

/// The `.claude` root under the resolved home directory.
///
/// Team state lives at `<claude_root>/teams` and task state at
/// `<claude_root>/tasks`.
pub fn claude_root() -> Result<PathBuf> {
    Ok(get_home_dir()?.join(".claude"))
}
