//! Tracing setup for the CLI.
//!
//! Diagnostics go to stderr so stdout stays parseable JSON. The filter comes
//! from `TEKTREE_LOG` (same syntax as `RUST_LOG`) and defaults to `warn`.
//! With a log file, events are written as JSON lines through a non-blocking
//! writer whose guard must outlive the program.

use crate::{Error, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "TEKTREE_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Build the filter from `TEKTREE_LOG`, falling back to `warn`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber.
///
/// Returns the appender guard when logging to a file. Calling this twice is
/// harmless; the second subscriber is ignored.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let Some(path) = log_file else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
        return Ok(None);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::Other(format!("Failed to open log file {}: {}", path.display(), e)))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .try_init();
    Ok(Some(guard))
}
