//! Resource fetcher: runs the listing command for a node and turns its
//! output into child nodes.
//!
//! Children are never cached; every call re-runs the command.

pub mod payload;

use crate::executor::Executor;
use crate::health::ClusterStatus;
use crate::protocol::{CliCommand, Command};
use crate::tree::{Category, TreeNode};
use crate::{Error, Result};
use payload::{PipelineSpec, ResourceItem, TaskSpec, PIPELINE_TASK_LABEL};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// How the children of one node are obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub command: CliCommand,
    /// Category of the produced children.
    pub child: Category,
    /// Whether the children go through the pagination controller.
    pub paginated: bool,
}

impl Listing {
    fn new(command: CliCommand, child: Category, paginated: bool) -> Self {
        Self {
            command,
            child,
            paginated,
        }
    }
}

/// The listing for a node's children, or `None` for leaves and the root.
pub fn listing_for(node: &TreeNode) -> Option<Listing> {
    let listing = match node.category() {
        Category::PipelineList => Listing::new(Command::list_pipelines(), Category::Pipeline, false),
        Category::PipelineRunList => {
            Listing::new(Command::list_pipeline_runs(), Category::PipelineRun, true)
        }
        Category::TaskList => Listing::new(Command::list_tasks(), Category::Task, false),
        Category::ClusterTaskList => {
            Listing::new(Command::list_cluster_tasks(), Category::ClusterTask, false)
        }
        Category::TaskRunList => Listing::new(Command::list_task_runs(), Category::TaskRun, true),
        Category::PipelineResourceList => Listing::new(
            Command::list_pipeline_resources(),
            Category::PipelineResource,
            false,
        ),
        Category::TriggerTemplateList => Listing::new(
            Command::list_trigger_templates(),
            Category::TriggerTemplate,
            false,
        ),
        Category::TriggerBindingList => Listing::new(
            Command::list_trigger_bindings(),
            Category::TriggerBinding,
            false,
        ),
        Category::ClusterTriggerBindingList => Listing::new(
            Command::list_cluster_trigger_bindings(),
            Category::ClusterTriggerBinding,
            false,
        ),
        Category::EventListenerList => Listing::new(
            Command::list_event_listeners(),
            Category::EventListener,
            false,
        ),
        Category::ConditionList => {
            Listing::new(Command::list_conditions(), Category::Condition, false)
        }
        Category::Pipeline => Listing::new(
            Command::list_pipeline_runs_for(node.name()),
            Category::PipelineRun,
            true,
        ),
        Category::PipelineRun => Listing::new(
            Command::list_task_runs_for_pipeline_run(node.name()),
            Category::TaskRun,
            true,
        ),
        Category::Task | Category::ClusterTask => Listing::new(
            Command::list_task_runs_for_task(node.name()),
            Category::TaskRun,
            true,
        ),
        Category::Root
        | Category::TaskRun
        | Category::PipelineResource
        | Category::TriggerTemplate
        | Category::TriggerBinding
        | Category::ClusterTriggerBinding
        | Category::EventListener
        | Category::Condition
        | Category::Unavailable => return None,
    };
    Some(listing)
}

/// Runs listings through an [`Executor`] and builds child nodes.
#[derive(Clone)]
pub struct ResourceFetcher {
    executor: Arc<dyn Executor>,
    verbosity: u32,
}

impl ResourceFetcher {
    pub fn new(executor: Arc<dyn Executor>, verbosity: u32) -> Self {
        Self {
            executor,
            verbosity,
        }
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Level passed as `-v` to the commands that take it.
    pub fn verbosity(&self) -> u32 {
        self.verbosity
    }

    /// All children of `parent`, unpaginated. Leaves yield nothing.
    pub async fn fetch(&self, parent: &Arc<TreeNode>) -> Vec<Arc<TreeNode>> {
        match listing_for(parent) {
            Some(listing) => self.fetch_listing(&listing, parent).await,
            None => Vec::new(),
        }
    }

    /// Execute one listing. A failed command yields a single placeholder.
    pub async fn fetch_listing(&self, listing: &Listing, parent: &Arc<TreeNode>) -> Vec<Arc<TreeNode>> {
        let command = listing.command.clone().with_verbosity(self.verbosity);
        let exit = self.executor.execute(&command).await;
        if !exit.succeeded {
            // A missing CRD under one category is not a missing installation.
            let diagnostic = match ClusterStatus::classify(&exit) {
                ClusterStatus::Ready | ClusterStatus::MissingInstallation => exit.diagnostic(),
                status => status.message().unwrap_or_default().to_string(),
            };
            let diagnostic = if diagnostic.is_empty() {
                format!("Failed to list {}", listing.child)
            } else {
                diagnostic
            };
            tracing::warn!(
                parent = %parent.name(),
                command = %command,
                error = %diagnostic,
                "listing failed"
            );
            return vec![TreeNode::placeholder(diagnostic, Some(parent))];
        }
        build_nodes(payload::parse_items(&exit.stdout), listing.child, parent)
    }

    /// Spec of a task or cluster task, used to build start commands.
    pub async fn task_definition(&self, name: &str, cluster: bool) -> Result<TaskSpec> {
        let spec = self.definition(Command::get_task(name, cluster), name).await?;
        Ok(serde_json::from_value(spec)?)
    }

    pub async fn pipeline_definition(&self, name: &str) -> Result<PipelineSpec> {
        let spec = self.definition(Command::get_pipeline(name), name).await?;
        Ok(serde_json::from_value(spec)?)
    }

    async fn definition(&self, command: CliCommand, name: &str) -> Result<serde_json::Value> {
        let exit = self.executor.execute(&command).await;
        if !exit.succeeded {
            let diagnostic = exit.diagnostic();
            return Err(if diagnostic.contains("NotFound") || diagnostic.contains("not found") {
                Error::NotFound(name.to_string())
            } else {
                Error::Command(diagnostic)
            });
        }
        let item: ResourceItem = serde_json::from_str(&exit.stdout)?;
        Ok(item.spec.unwrap_or_else(|| serde_json::json!({})))
    }
}

/// Dedup by name (first wins), wrap, and sort.
pub fn build_nodes(
    items: Vec<ResourceItem>,
    category: Category,
    parent: &Arc<TreeNode>,
) -> Vec<Arc<TreeNode>> {
    let mut seen = HashSet::new();
    let mut nodes: Vec<Arc<TreeNode>> = items
        .into_iter()
        .filter_map(|item| {
            let name = item.name()?.to_string();
            if !seen.insert(name.clone()) {
                return None;
            }
            let mut node = TreeNode::new(name, category, Some(parent));
            if category.is_run() {
                node = node
                    .with_state(item.state())
                    .with_times(item.creation_time(), item.completion_time());
            }
            if category == Category::TaskRun {
                node = node.with_short_name(item.label(PIPELINE_TASK_LABEL).map(str::to_string));
            }
            Some(Arc::new(node))
        })
        .collect();
    nodes.sort_by(|a, b| compare_nodes(a, b));
    nodes
}

/// Category tag first; then newest first for runs, name otherwise.
///
/// Runs without a creation time come last. Equal keys keep input order
/// since `sort_by` is stable.
pub fn compare_nodes(a: &TreeNode, b: &TreeNode) -> Ordering {
    a.category().cmp(&b.category()).then_with(|| {
        if a.category().is_run() {
            match (a.creation_time(), b.creation_time()) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        } else {
            a.name().cmp(b.name())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExitData;
    use crate::testing::FakeExecutor;
    use crate::tree::RunState;
    use serde_json::json;

    fn setup(category: Category, name: &str) -> (Arc<FakeExecutor>, ResourceFetcher, Arc<TreeNode>) {
        let fake = Arc::new(FakeExecutor::new());
        let fetcher = ResourceFetcher::new(fake.clone(), 0);
        let node = Arc::new(TreeNode::new(name, category, None));
        (fake, fetcher, node)
    }

    fn names(nodes: &[Arc<TreeNode>]) -> Vec<&str> {
        nodes.iter().map(|n| n.name()).collect()
    }

    // ==== Dedup and Sort Tests ====

    #[tokio::test]
    async fn test_dedup_first_wins() {
        let (fake, fetcher, tasks) = setup(Category::TaskList, "Tasks");
        fake.respond_items(
            "kubectl get task -o json",
            json!([
                {"metadata": {"name": "a"}},
                {"metadata": {"name": "a"}},
                {"metadata": {"name": "b"}}
            ]),
        );
        let nodes = fetcher.fetch(&tasks).await;
        assert_eq!(names(&nodes), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_sort_by_name() {
        let (fake, fetcher, tasks) = setup(Category::TaskList, "Tasks");
        fake.respond_items(
            "kubectl get task -o json",
            json!([{"metadata": {"name": "b"}}, {"metadata": {"name": "a"}}]),
        );
        let nodes = fetcher.fetch(&tasks).await;
        assert_eq!(names(&nodes), ["a", "b"]);
        assert!(nodes.iter().all(|n| n.category() == Category::Task));
    }

    #[tokio::test]
    async fn test_runs_newest_first() {
        let (fake, fetcher, runs) = setup(Category::PipelineRunList, "PipelineRuns");
        fake.respond_items(
            "kubectl get pipelinerun -o json",
            json!([
                {"metadata": {"name": "old", "creationTimestamp": "2024-01-01T00:00:00Z"}},
                {"metadata": {"name": "untimed"}},
                {"metadata": {"name": "new", "creationTimestamp": "2024-02-01T00:00:00Z"},
                 "status": {"conditions": [{"status": "Unknown"}]}}
            ]),
        );
        let nodes = fetcher.fetch(&runs).await;
        assert_eq!(names(&nodes), ["new", "old", "untimed"]);
        assert_eq!(nodes[0].state(), Some(RunState::Running));
    }

    #[tokio::test]
    async fn test_equal_timestamps_keep_first_seen_order() {
        let (fake, fetcher, runs) = setup(Category::TaskRunList, "TaskRuns");
        fake.respond_items(
            "kubectl get taskrun -o json",
            json!([
                {"metadata": {"name": "z", "creationTimestamp": "2024-01-01T00:00:00Z"}},
                {"metadata": {"name": "a", "creationTimestamp": "2024-01-01T00:00:00Z"}}
            ]),
        );
        let nodes = fetcher.fetch(&runs).await;
        assert_eq!(names(&nodes), ["z", "a"]);
    }

    #[tokio::test]
    async fn test_task_run_short_name() {
        let (fake, fetcher, run) = setup(Category::PipelineRun, "build-x1");
        fake.respond_items(
            "kubectl get taskrun -l tekton.dev/pipelineRun=build-x1 -o json",
            json!([{"metadata": {
                "name": "build-x1-compile-q9",
                "labels": {"tekton.dev/pipelineTask": "compile"}
            }}]),
        );
        let nodes = fetcher.fetch(&run).await;
        assert_eq!(nodes[0].label(), "compile");
        assert!(Arc::ptr_eq(&nodes[0].parent().unwrap(), &run));
    }

    // ==== Failure Handling Tests ====

    #[tokio::test]
    async fn test_lenient_parse() {
        let (fake, fetcher, tasks) = setup(Category::TaskList, "Tasks");
        fake.respond("kubectl get task -o json", ExitData::success("not json"));
        assert!(fetcher.fetch(&tasks).await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_yields_single_placeholder() {
        let (fake, fetcher, tasks) = setup(Category::ClusterTaskList, "ClusterTasks");
        fake.respond(
            "kubectl get clustertask -o json",
            ExitData::failure("", "error: forbidden: cannot list clustertasks"),
        );
        let nodes = fetcher.fetch(&tasks).await;
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_placeholder());
        assert_eq!(nodes[0].name(), "error: forbidden: cannot list clustertasks");
    }

    #[tokio::test]
    async fn test_failure_with_known_signature_uses_message() {
        let (fake, fetcher, tasks) = setup(Category::TaskList, "Tasks");
        fake.respond(
            "kubectl get task -o json",
            ExitData::failure("", "Unable to connect to the server: EOF"),
        );
        let nodes = fetcher.fetch(&tasks).await;
        assert_eq!(nodes[0].name(), "Unable to connect to OpenShift cluster, is it down?");
    }

    #[tokio::test]
    async fn test_leaves_run_nothing() {
        let (fake, fetcher, run) = setup(Category::TaskRun, "tr-1");
        assert!(fetcher.fetch(&run).await.is_empty());
        assert!(fake.calls().is_empty());
    }

    // ==== Command Selection Tests ====

    #[tokio::test]
    async fn test_verbosity_applied_to_listing() {
        let fake = Arc::new(FakeExecutor::new());
        let fetcher = ResourceFetcher::new(fake.clone(), 4);
        let node = Arc::new(TreeNode::new("Pipelines", Category::PipelineList, None));
        fetcher.fetch(&node).await;
        assert_eq!(fake.calls(), ["kubectl get pipeline -o json -v 4"]);
    }

    #[test]
    fn test_listing_table() {
        let cluster_task = TreeNode::new("lint", Category::ClusterTask, None);
        let listing = listing_for(&cluster_task).unwrap();
        assert_eq!(listing.child, Category::TaskRun);
        assert!(listing.paginated);
        assert_eq!(
            listing.command.to_shell_string(),
            "kubectl get taskrun -l tekton.dev/task=lint -o json"
        );

        let pipelines = TreeNode::new("Pipelines", Category::PipelineList, None);
        assert!(!listing_for(&pipelines).unwrap().paginated);
        assert!(listing_for(&TreeNode::root()).is_none());
    }

    #[tokio::test]
    async fn test_idempotent_fetch_is_reference_distinct() {
        let (fake, fetcher, tasks) = setup(Category::TaskList, "Tasks");
        fake.respond_items(
            "kubectl get task -o json",
            json!([{"metadata": {"name": "a"}}, {"metadata": {"name": "b"}}]),
        );
        let first = fetcher.fetch(&tasks).await;
        let second = fetcher.fetch(&tasks).await;
        assert_eq!(names(&first), names(&second));
        assert!(!Arc::ptr_eq(&first[0], &second[0]));
        assert_eq!(fake.call_count("kubectl get task -o json"), 2);
    }

    // ==== Definition Tests ====

    #[tokio::test]
    async fn test_task_definition() {
        let fake = Arc::new(FakeExecutor::new());
        let fetcher = ResourceFetcher::new(fake.clone(), 0);
        fake.respond(
            "kubectl get clustertask buildah -o json",
            ExitData::success(
                json!({
                    "metadata": {"name": "buildah"},
                    "spec": {"resources": {"inputs": [{"name": "source", "type": "git"}]}}
                })
                .to_string(),
            ),
        );
        let spec = fetcher.task_definition("buildah", true).await.unwrap();
        assert_eq!(payload::flatten_task_resources(&spec).len(), 1);
    }

    #[tokio::test]
    async fn test_missing_definition_is_not_found() {
        let fake = Arc::new(FakeExecutor::new());
        let fetcher = ResourceFetcher::new(fake.clone(), 0);
        fake.respond(
            "kubectl get pipeline ghost -o json",
            ExitData::failure(
                "",
                "Error from server (NotFound): pipelines.tekton.dev \"ghost\" not found",
            ),
        );
        let err = fetcher.pipeline_definition("ghost").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(name) if name == "ghost"));
    }
}
