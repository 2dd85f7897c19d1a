//! Classification of cluster connectivity and authorization failures.

use crate::executor::ExitData;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static UNREACHABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)unable to connect to the server").expect("Invalid regex")
});

/// Outcome of the cluster health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterStatus {
    Ready,
    PrivilegeDenied,
    LoginRequired,
    MissingInstallation,
    Unreachable,
}

impl ClusterStatus {
    /// Match exit data against the known failure signatures, in order.
    ///
    /// Anything unrecognised, including a plain failure, is `Ready`: only
    /// these four signatures replace the whole tree.
    pub fn classify(exit: &ExitData) -> Self {
        if exit.stdout.trim() == "no" {
            return ClusterStatus::PrivilegeDenied;
        }
        let error = exit.error.as_deref().unwrap_or_default();
        if error.to_ascii_lowercase().contains("unauthorized") {
            ClusterStatus::LoginRequired
        } else if error.contains("doesn't have a resource type") {
            ClusterStatus::MissingInstallation
        } else if UNREACHABLE.is_match(error) {
            ClusterStatus::Unreachable
        } else {
            ClusterStatus::Ready
        }
    }

    pub fn is_ready(&self) -> bool {
        *self == ClusterStatus::Ready
    }

    /// Text shown on the placeholder that replaces the tree.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ClusterStatus::Ready => None,
            ClusterStatus::PrivilegeDenied => Some(
                "The current user doesn't have the privileges to interact with tekton resources.",
            ),
            ClusterStatus::LoginRequired => Some("Please login to the server."),
            ClusterStatus::MissingInstallation => {
                Some("Please install the OpenShift Pipelines Operator.")
            }
            ClusterStatus::Unreachable => Some("Unable to connect to OpenShift cluster, is it down?"),
        }
    }
}
