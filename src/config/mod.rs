//! Configuration for tektree.
//!
//! ## config.kdl
//!
//! Located at `$XDG_CONFIG_HOME/tektree/config.kdl` (usually
//! `~/.config/tektree/config.kdl`), or wherever `--config` / `TEKTREE_CONFIG`
//! points.
//!
//! Contains:
//! - `tree-pagination-limit` - Children shown before "more" (default 5)
//! - `output-verbosity-level` - `-v` level passed to commands (default 0)
//! - `tkn-path`, `kubectl-path` - Explicit binary locations
//! - `command-timeout` - Seconds before a command is killed (default 60)
//! - `watch-debounce-ms` - Quiet period before a watch refresh (default 100)
//!
//! ## Precedence
//!
//! CLI flag (or its environment variable) > config.kdl > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{ConfigOverrides, Resolved, ResolvedConfig, ValueSource, resolve_config};
pub use schema::TektreeConfig;

use crate::{Error, Result};
use kdl::KdlDocument;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TEKTREE_CONFIG";

/// Default config location (`~/.config/tektree/config.kdl`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tektree").join("config.kdl"))
}

/// Load and validate a config file.
///
/// Returns an empty config if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<TektreeConfig> {
    if !path.exists() {
        return Ok(TektreeConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let doc: KdlDocument = content
        .parse()
        .map_err(|e| Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e)))?;

    let config = TektreeConfig::from_kdl(&doc)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    config
        .validate()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Write a config file, creating parent directories.
pub fn write_config(path: &Path, config: &TektreeConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_kdl().to_string())?;
    Ok(())
}
