//! Root assembly and the cluster health check that gates it.

use crate::executor::Executor;
use crate::health::ClusterStatus;
use crate::protocol::Command;
use crate::tree::{ROOT_CATEGORIES, TreeNode};
use std::sync::Arc;

/// The fixed, ordered top-level category nodes under `root`.
pub fn assemble(root: &Arc<TreeNode>) -> Vec<Arc<TreeNode>> {
    ROOT_CATEGORIES
        .iter()
        .filter_map(|category| {
            let title = category.list_title()?;
            Some(Arc::new(TreeNode::new(title, *category, Some(root))))
        })
        .collect()
}

/// Run the health probes in order, stopping at the first failure.
///
/// Failures that match no known signature are logged and treated as ready,
/// so the per-category fetches can report them.
pub async fn check_cluster(executor: &dyn Executor) -> ClusterStatus {
    for command in Command::check_tekton() {
        let exit = executor.execute(&command).await;
        let status = ClusterStatus::classify(&exit);
        if !status.is_ready() {
            tracing::info!(status = ?status, command = %command, "cluster not usable");
            return status;
        }
        if !exit.succeeded {
            tracing::warn!(
                command = %command,
                error = %exit.diagnostic(),
                "health check failed, continuing"
            );
            break;
        }
    }
    ClusterStatus::Ready
}
