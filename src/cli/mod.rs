//! CLI argument definitions for tektree.

use crate::protocol::start::StartWorkspace;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tektree - browse Tekton pipelines, runs and triggers as a tree.
///
/// Start with `tektree tree` to see the top-level categories, then
/// `tektree children <category>` to drill in.
#[derive(Parser, Debug)]
#[command(name = "tektree")]
#[command(author, version, about = "A tree view of Tekton resources backed by tkn and kubectl", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Config file to read instead of ~/.config/tektree/config.kdl
    #[arg(long, global = true, env = "TEKTREE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Children shown per node before a "more" entry
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>,

    /// Verbosity level passed to kubectl/tkn as `-v <level>`
    #[arg(short = 'v', long, global = true)]
    pub verbosity: Option<u32>,

    /// Path to the tkn binary
    #[arg(long, global = true, env = "TEKTREE_TKN")]
    pub tkn: Option<PathBuf>,

    /// Path to the kubectl binary
    #[arg(long, global = true, env = "TEKTREE_KUBECTL")]
    pub kubectl: Option<PathBuf>,

    /// Write logs as JSON lines to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the cluster and show the resource tree
    Tree {
        /// Levels to expand below the categories (0 shows categories only)
        #[arg(long, default_value_t = 0)]
        depth: usize,
    },

    /// Show the children of a node, addressed by names from the top
    ///
    /// Example: `tektree children PipelineRuns build-x7k2`
    Children {
        /// Node names (or labels) from the category down
        #[arg(required = true, num_args = 1..)]
        path: Vec<String>,

        /// Pages to reveal (each "more" selection adds one page)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        pages: u64,
    },

    /// Show the tree and re-render it as running pipelines change (Ctrl-C to stop)
    Watch {
        /// Levels to expand below the categories
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },

    /// Stream logs of a run through tkn
    Logs {
        /// Kind of run
        kind: RunKind,

        /// Run name
        name: String,

        /// Follow the log until the run ends
        #[arg(short, long)]
        follow: bool,
    },

    /// List the resources a task declares, tagged inputs/outputs
    Resources {
        /// Task name
        task: String,

        /// Look up a ClusterTask instead of a Task
        #[arg(long)]
        cluster: bool,
    },

    /// Start a task or pipeline through tkn
    Start {
        #[command(subcommand)]
        command: StartCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show version and the detected tkn version
    Version,
}

/// Kind of run whose logs to show.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Pipelinerun,
    Taskrun,
}

/// Arguments shared by both start targets.
#[derive(clap::Args, Debug, Clone)]
pub struct StartArgs {
    /// Task or pipeline name
    pub name: String,

    /// Resource binding `name=ref` (repeatable)
    #[arg(long = "resource", short = 'r', value_parser = parse_key_value)]
    pub resources: Vec<(String, String)>,

    /// Parameter `key=value` (repeatable)
    #[arg(long = "param", short = 'p', value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Workspace binding, e.g. `name=shared,claimName=pvc,subPath=src`
    /// or `name=cfg,config=app-config,item=key=path` (repeatable)
    #[arg(long = "workspace", short = 'w', value_parser = parse_workspace)]
    pub workspaces: Vec<StartWorkspace>,

    /// Service account to run as
    #[arg(short = 's', long)]
    pub service_account: Option<String>,

    /// Print the tkn command instead of running it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum StartCommands {
    /// Start a task (resources are matched to the task's declared inputs/outputs)
    Task {
        #[command(flatten)]
        args: StartArgs,

        /// Start a ClusterTask instead of a Task
        #[arg(long)]
        cluster: bool,
    },

    /// Start a pipeline (service account defaults to "pipeline")
    Pipeline {
        #[command(flatten)]
        args: StartArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration and where each value came from
    Show,

    /// Write a config file populated with the current settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse `key=value`, splitting on the first `=`.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

/// Parse a `-w` workspace binding in tkn's `name=..,<source>=..` form.
pub fn parse_workspace(s: &str) -> Result<StartWorkspace, String> {
    s.parse()
}
