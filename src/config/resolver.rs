//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (or the environment variables clap reads for them)
//! 2. config.kdl
//! 3. Built-in defaults

use crate::Result;
use crate::config::{TektreeConfig, default_config_path, load_config};
use crate::executor::{DEFAULT_COMMAND_TIMEOUT, ToolPaths};
use crate::explorer::ExplorerOptions;
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::watch::DEFAULT_DEBOUNCE;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from a config file
    ConfigFile(PathBuf),
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::ConfigFile(path) => write!(f, "config-file:{}", path.display()),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// The config file consulted, whether or not it exists
    pub config_path: Option<PathBuf>,
    pub tree_pagination_limit: Resolved<usize>,
    pub output_verbosity_level: Resolved<u32>,
    pub tkn_path: Option<Resolved<PathBuf>>,
    pub kubectl_path: Option<Resolved<PathBuf>>,
    /// Seconds
    pub command_timeout: Resolved<u64>,
    pub watch_debounce_ms: Resolved<u64>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            tree_pagination_limit: Resolved::new(DEFAULT_PAGE_SIZE, ValueSource::Default),
            output_verbosity_level: Resolved::new(0, ValueSource::Default),
            tkn_path: None,
            kubectl_path: None,
            command_timeout: Resolved::new(DEFAULT_COMMAND_TIMEOUT.as_secs(), ValueSource::Default),
            watch_debounce_ms: Resolved::new(
                DEFAULT_DEBOUNCE.as_millis() as u64,
                ValueSource::Default,
            ),
        }
    }
}

impl ResolvedConfig {
    pub fn page_size(&self) -> usize {
        self.tree_pagination_limit.value
    }

    pub fn verbosity(&self) -> u32 {
        self.output_verbosity_level.value
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout.value)
    }

    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            tkn: self.tkn_path.as_ref().map(|r| r.value.clone()),
            kubectl: self.kubectl_path.as_ref().map(|r| r.value.clone()),
        }
    }

    pub fn explorer_options(&self) -> ExplorerOptions {
        ExplorerOptions {
            page_size: self.page_size(),
            verbosity: self.verbosity(),
            debounce: Duration::from_millis(self.watch_debounce_ms.value),
        }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub page_size: Option<usize>,
    pub verbosity: Option<u32>,
    pub tkn_path: Option<PathBuf>,
    pub kubectl_path: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_verbosity(mut self, level: u32) -> Self {
        self.verbosity = Some(level);
        self
    }

    pub fn with_tkn_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tkn_path = Some(path.into());
        self
    }

    pub fn with_kubectl_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubectl_path = Some(path.into());
        self
    }
}

/// Resolve configuration with full precedence chain.
///
/// The file is `overrides.config_path` if set, otherwise the default
/// location. A missing file contributes nothing.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let path = overrides.config_path.clone().or_else(default_config_path);
    let file = match &path {
        Some(p) => load_config(p)?,
        None => TektreeConfig::default(),
    };
    let mut result = resolve_with(&file, path.as_deref(), overrides);
    result.config_path = path;
    Ok(result)
}

/// Resolve against an already-loaded config file.
pub fn resolve_with(
    file: &TektreeConfig,
    file_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> ResolvedConfig {
    let mut result = ResolvedConfig::default();
    let from_file = || ValueSource::ConfigFile(file_path.map(Path::to_path_buf).unwrap_or_default());

    // Resolve tree_pagination_limit
    if let Some(page_size) = overrides.page_size {
        result.tree_pagination_limit = Resolved::new(page_size, ValueSource::CliFlag);
    } else if let Some(page_size) = file.tree_pagination_limit {
        result.tree_pagination_limit = Resolved::new(page_size as usize, from_file());
    }

    // Resolve output_verbosity_level
    if let Some(level) = overrides.verbosity {
        result.output_verbosity_level = Resolved::new(level, ValueSource::CliFlag);
    } else if let Some(level) = file.output_verbosity_level {
        result.output_verbosity_level = Resolved::new(level, from_file());
    }

    // Resolve tool paths
    if let Some(ref path) = overrides.tkn_path {
        result.tkn_path = Some(Resolved::new(path.clone(), ValueSource::CliFlag));
    } else if let Some(ref path) = file.tkn_path {
        result.tkn_path = Some(Resolved::new(path.clone(), from_file()));
    }
    if let Some(ref path) = overrides.kubectl_path {
        result.kubectl_path = Some(Resolved::new(path.clone(), ValueSource::CliFlag));
    } else if let Some(ref path) = file.kubectl_path {
        result.kubectl_path = Some(Resolved::new(path.clone(), from_file()));
    }

    // File-only settings
    if let Some(secs) = file.command_timeout {
        result.command_timeout = Resolved::new(secs, from_file());
    }
    if let Some(ms) = file.watch_debounce_ms {
        result.watch_debounce_ms = Resolved::new(ms, from_file());
    }

    result
}
