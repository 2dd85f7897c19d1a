//! Tektree - a lazily-populated tree of Tekton pipeline resources.
//!
//! This library provides the core functionality for the `tektree` CLI tool:
//! fetching resources through `tkn`/`kubectl`, paginating children,
//! classifying cluster failures into placeholder nodes, and refreshing
//! subtrees when running pipelines change.

pub mod cli;
pub mod commands;
pub mod config;
pub mod executor;
pub mod explorer;
pub mod fetch;
pub mod format;
pub mod health;
pub mod logging;
pub mod pagination;
pub mod protocol;
pub mod tree;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

/// Main error type for tektree operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for tektree operations.
pub type Result<T> = std::result::Result<T, Error>;
