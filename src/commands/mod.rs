//! Command implementations for the tektree CLI.
//!
//! Each command returns a value implementing [`Output`], which `main` prints
//! as JSON (default) or human-readable text (`-H`).
//! - `tree`, `children`, `watch` - browse the resource tree
//! - `logs`, `start` - hand a tkn command to the terminal
//! - `resources` - declared task resources
//! - `config show`, `config init`, `version`

use crate::cli::{RunKind, StartArgs};
use crate::config::{ResolvedConfig, TektreeConfig, load_config, write_config};
use crate::executor::Executor;
use crate::explorer::Explorer;
use crate::fetch::ResourceFetcher;
use crate::fetch::payload::{ParamSpec, TaskResource, flatten_task_resources};
use crate::format;
use crate::protocol::start::{ResourceDirection, StartObject, StartResource};
use crate::protocol::{CliCommand, Command};
use crate::tree::{Category, NodeKey, RunState, TreeItem, TreeNode};
use crate::watch::RefreshEvent;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

// ============================================================================
// Tree rendering
// ============================================================================

/// Serializable snapshot of one tree entry.
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    /// `node`, `more` or `placeholder`
    pub kind: &'static str,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<RunState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeView>,
}

impl NodeView {
    pub fn from_item(item: &TreeItem, now: DateTime<Utc>) -> Self {
        let description = format::description(item, now);
        match item {
            TreeItem::Node(node) => Self {
                kind: if node.is_placeholder() { "placeholder" } else { "node" },
                label: node.label().to_string(),
                name: Some(node.name().to_string()),
                category: Some(node.category()),
                state: node.state(),
                description,
                tooltip: None,
                children: Vec::new(),
            },
            TreeItem::More(more) => Self {
                kind: "more",
                label: item.label().to_string(),
                name: None,
                category: None,
                state: None,
                description,
                tooltip: Some(more.tooltip()),
                children: Vec::new(),
            },
        }
    }

    fn render(&self, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        if self.kind == "placeholder" {
            out.push_str("! ");
        }
        out.push_str(&self.label);
        if let Some(state) = self.state {
            out.push_str(&format!(" [{:?}]", state));
        }
        if let Some(description) = &self.description {
            out.push_str(&format!(" - {}", description));
        }
        out.push('\n');
        for child in &self.children {
            child.render(depth + 1, out);
        }
    }
}

fn render_all(nodes: &[NodeView], depth: usize) -> String {
    let mut out = String::new();
    for node in nodes {
        node.render(depth, &mut out);
    }
    out.trim_end().to_string()
}

/// A fetched entry with its expanded children.
///
/// Holds the nodes strongly so their parents stay reachable while rendered.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub item: TreeItem,
    pub children: Vec<Rendered>,
    /// Levels still to expand below this entry
    levels: usize,
}

impl Rendered {
    fn view(&self, now: DateTime<Utc>) -> NodeView {
        let mut view = NodeView::from_item(&self.item, now);
        view.children = self.children.iter().map(|c| c.view(now)).collect();
        view
    }

    fn node_key(&self) -> Option<NodeKey> {
        self.item.as_node().map(|n| n.key())
    }

    fn find_mut(&mut self, key: &NodeKey) -> Option<&mut Rendered> {
        if self.item.as_node().is_some_and(|n| n.key() == *key) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(key))
    }
}

/// Fetch children of each expandable node, `levels` deep.
///
/// Nodes matching an entry of `previous` inherit its pagination cursor, so
/// pages revealed before a re-fetch stay revealed.
fn expand<'a>(
    explorer: &'a Explorer,
    items: Vec<TreeItem>,
    levels: usize,
    previous: &'a [Rendered],
) -> BoxFuture<'a, Vec<Rendered>> {
    async move {
        let mut rendered = Vec::with_capacity(items.len());
        for item in items {
            let children = match item.as_node() {
                Some(node) if levels > 0 && node.category().is_expandable() => {
                    let key = node.key();
                    let before = previous.iter().find(|r| r.node_key().as_ref() == Some(&key));
                    if let Some(old) = before.and_then(|r| r.item.as_node()) {
                        node.carry_pagination_from(old);
                    }
                    let children = explorer.get_children(node).await;
                    let grandchildren = before.map(|r| r.children.as_slice()).unwrap_or_default();
                    expand(explorer, children, levels - 1, grandchildren).await
                }
                _ => Vec::new(),
            };
            rendered.push(Rendered {
                item,
                children,
                levels,
            });
        }
        rendered
    }
    .boxed()
}

async fn render_tree(explorer: &Explorer, depth: usize, previous: &[Rendered]) -> Vec<Rendered> {
    let items = explorer.root_children().await;
    expand(explorer, items, depth, previous).await
}

/// Result of the `tree` command.
#[derive(Debug, Serialize)]
pub struct TreeView {
    pub nodes: Vec<NodeView>,
}

impl Output for TreeView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        render_all(&self.nodes, 0)
    }
}

/// Health check, root assembly and `depth` levels of expansion.
pub async fn tree(explorer: &Explorer, depth: usize) -> TreeView {
    let rendered = render_tree(explorer, depth, &[]).await;
    let now = Utc::now();
    TreeView {
        nodes: rendered.iter().map(|r| r.view(now)).collect(),
    }
}

/// Result of the `children` command.
#[derive(Debug, Serialize)]
pub struct ChildrenView {
    pub path: Vec<String>,
    pub children: Vec<NodeView>,
}

impl Output for ChildrenView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.children.is_empty() {
            return format!("{}: no children", self.path.join("/"));
        }
        format!("{}\n{}", self.path.join("/"), render_all(&self.children, 1))
    }
}

/// Children of the node at `path`, with `pages` pages revealed.
pub async fn children(explorer: &Explorer, path: &[String], pages: u64) -> Result<ChildrenView> {
    let chain = explorer.find(path).await?;
    let Some(target) = chain.last() else {
        return Err(Error::NotFound(path.join("/")));
    };

    let mut items = explorer.get_children(target).await;
    for _ in 1..pages {
        let Some(more) = items.iter().find_map(|i| i.as_more().cloned()) else {
            break;
        };
        explorer.select_more(&more);
        items = explorer.get_children(target).await;
    }

    let now = Utc::now();
    Ok(ChildrenView {
        path: target.path(),
        children: items.iter().map(|i| NodeView::from_item(i, now)).collect(),
    })
}

/// One re-render emitted by `watch`.
#[derive(Debug, Serialize)]
pub struct WatchFrame {
    /// `tree` for a full render, `node` for one subtree
    pub event: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    pub at: DateTime<Utc>,
    /// Runs currently being watched for changes
    pub watching: usize,
    pub nodes: Vec<NodeView>,
}

impl Output for WatchFrame {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let title = if self.path.is_empty() {
            "tree".to_string()
        } else {
            self.path.join("/")
        };
        format!(
            "== {} ({}, watching {}) ==\n{}",
            title,
            self.at.format("%H:%M:%S"),
            self.watching,
            render_all(&self.nodes, 0)
        )
    }
}

impl WatchFrame {
    fn full(explorer: &Explorer, rendered: &[Rendered]) -> Self {
        let at = Utc::now();
        Self {
            event: "tree",
            path: Vec::new(),
            at,
            watching: explorer.poller().active_watches().len(),
            nodes: rendered.iter().map(|r| r.view(at)).collect(),
        }
    }

    fn subtree(explorer: &Explorer, node: &TreeNode, rendered: &Rendered) -> Self {
        let at = Utc::now();
        Self {
            event: "node",
            path: node.path(),
            at,
            watching: explorer.poller().active_watches().len(),
            nodes: rendered.children.iter().map(|r| r.view(at)).collect(),
        }
    }
}

/// Render the tree, then re-render on every refresh event until `shutdown`
/// resolves. All watches are cancelled on return.
pub async fn watch<S, F>(explorer: &Explorer, depth: usize, shutdown: S, mut emit: F) -> Result<()>
where
    S: Future<Output = ()>,
    F: FnMut(&dyn Output),
{
    let mut events = explorer.subscribe();
    let mut tree = render_tree(explorer, depth, &[]).await;
    emit(&WatchFrame::full(explorer, &tree));

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(RefreshEvent::Tree) | Err(RecvError::Lagged(_)) => {
                    let previous = std::mem::take(&mut tree);
                    tree = render_tree(explorer, depth, &previous).await;
                    emit(&WatchFrame::full(explorer, &tree));
                }
                Ok(RefreshEvent::Node(node)) => {
                    // A run's own state comes from its parent's listing.
                    let node = match node.parent() {
                        Some(parent) if node.category().is_run() && !parent.is_root() => parent,
                        _ => node,
                    };
                    let key = node.key();
                    let Some(slot) = tree.iter_mut().find_map(|r| r.find_mut(&key)) else {
                        tracing::debug!(node = %key, "refresh for a node not on screen");
                        continue;
                    };
                    let Some(target) = slot.item.as_node().cloned() else {
                        continue;
                    };
                    if slot.levels == 0 {
                        continue;
                    }
                    let previous = std::mem::take(&mut slot.children);
                    let children = explorer.get_children(&target).await;
                    slot.children = expand(explorer, children, slot.levels - 1, &previous).await;
                    emit(&WatchFrame::subtree(explorer, &target, slot));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    explorer.shutdown();
    Ok(())
}

// ============================================================================
// Terminal commands
// ============================================================================

/// Stream run logs through `tkn ... logs`, attached to this terminal.
pub async fn logs(
    executor: &dyn Executor,
    kind: RunKind,
    name: &str,
    follow: bool,
    verbosity: u32,
) -> Result<()> {
    let command = match kind {
        RunKind::Pipelinerun => Command::show_pipeline_run_logs(name, follow),
        RunKind::Taskrun => Command::show_task_run_logs(name, follow),
    };
    executor
        .execute_in_terminal(&command.with_verbosity(verbosity))
        .await
}

/// Result of `resources`.
#[derive(Debug, Serialize)]
pub struct ResourcesView {
    pub task: String,
    pub resources: Vec<TaskResource>,
}

impl Output for ResourcesView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.resources.is_empty() {
            return format!("{} declares no resources", self.task);
        }
        let mut lines = vec![format!("{}:", self.task)];
        for r in &self.resources {
            let direction = match r.direction {
                ResourceDirection::Inputs => "inputs",
                ResourceDirection::Outputs => "outputs",
            };
            let kind = r.resource_type.as_deref().unwrap_or("?");
            lines.push(format!("  {} ({}) {}", r.name, kind, direction));
        }
        lines.join("\n")
    }
}

pub async fn resources(fetcher: &ResourceFetcher, task: &str, cluster: bool) -> Result<ResourcesView> {
    let spec = fetcher.task_definition(task, cluster).await?;
    Ok(ResourcesView {
        task: task.to_string(),
        resources: flatten_task_resources(&spec),
    })
}

/// Result of `start`.
#[derive(Debug, Serialize)]
pub struct StartResult {
    pub command: String,
    pub executed: bool,
}

impl Output for StartResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.executed {
            format!("Ran: {}", self.command)
        } else {
            self.command.clone()
        }
    }
}

fn start_object(args: &StartArgs) -> StartObject {
    let mut object = StartObject::new(&args.name);
    object.resources = args
        .resources
        .iter()
        .map(|(name, resource_ref)| StartResource {
            name: name.clone(),
            resource_ref: resource_ref.clone(),
            direction: None,
        })
        .collect();
    object.params = args.params.clone();
    object.workspaces = args.workspaces.clone();
    object.service_account = args.service_account.clone();
    object
}

/// Append declared defaults for params the caller did not pass.
fn fill_param_defaults(object: &mut StartObject, declared: &[ParamSpec]) {
    for param in declared {
        if object.params.iter().any(|(key, _)| *key == param.name) {
            continue;
        }
        if let Some(value) = param.default_arg() {
            object.params.push((param.name.clone(), value));
        }
    }
}

fn undeclared_resource(kind: &str, name: &str, resource: &StartResource) -> Error {
    Error::InvalidInput(format!(
        "{} {} declares no resource named {}",
        kind, name, resource.name
    ))
}

async fn run_start(fetcher: &ResourceFetcher, command: CliCommand, dry_run: bool) -> Result<StartResult> {
    let command = command.with_verbosity(fetcher.verbosity());
    if !dry_run {
        fetcher.executor().execute_in_terminal(&command).await?;
    }
    Ok(StartResult {
        command: command.to_shell_string(),
        executed: !dry_run,
    })
}

/// Start a task. Each `--resource` is matched against the task's declared
/// resources to decide between `-i` and `-o`; declared params that were not
/// passed get their defaults.
pub async fn start_task(fetcher: &ResourceFetcher, args: &StartArgs, cluster: bool) -> Result<StartResult> {
    let spec = fetcher.task_definition(&args.name, cluster).await?;
    let declared = flatten_task_resources(&spec);
    let mut object = start_object(args);
    for resource in &mut object.resources {
        match declared.iter().find(|d| d.name == resource.name) {
            Some(d) => resource.direction = Some(d.direction),
            None => return Err(undeclared_resource("Task", &args.name, resource)),
        }
    }
    fill_param_defaults(&mut object, &spec.params);
    run_start(fetcher, Command::start_task(&object), args.dry_run).await
}

/// Start a pipeline. Every `--resource` must name one the pipeline declares.
pub async fn start_pipeline(fetcher: &ResourceFetcher, args: &StartArgs) -> Result<StartResult> {
    let spec = fetcher.pipeline_definition(&args.name).await?;
    let mut object = start_object(args);
    if let Some(resource) = object
        .resources
        .iter()
        .find(|r| !spec.resources.iter().any(|d| d.name == r.name))
    {
        return Err(undeclared_resource("Pipeline", &args.name, resource));
    }
    fill_param_defaults(&mut object, &spec.params);
    run_start(fetcher, Command::start_pipeline(&object), args.dry_run).await
}

// ============================================================================
// Config and version
// ============================================================================

/// Result of `config show`.
#[derive(Debug, Serialize)]
pub struct ConfigShowResult {
    #[serde(flatten)]
    pub config: ResolvedConfig,
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let c = &self.config;
        let mut lines = Vec::new();
        if let Some(path) = &c.config_path {
            lines.push(format!("config file: {}", path.display()));
        }
        lines.push(format!(
            "tree-pagination-limit: {} ({})",
            c.tree_pagination_limit.value, c.tree_pagination_limit.source
        ));
        lines.push(format!(
            "output-verbosity-level: {} ({})",
            c.output_verbosity_level.value, c.output_verbosity_level.source
        ));
        for (name, path) in [("tkn-path", &c.tkn_path), ("kubectl-path", &c.kubectl_path)] {
            match path {
                Some(r) => lines.push(format!("{}: {} ({})", name, r.value.display(), r.source)),
                None => lines.push(format!("{}: PATH lookup (default)", name)),
            }
        }
        lines.push(format!(
            "command-timeout: {}s ({})",
            c.command_timeout.value, c.command_timeout.source
        ));
        lines.push(format!(
            "watch-debounce-ms: {} ({})",
            c.watch_debounce_ms.value, c.watch_debounce_ms.source
        ));
        lines.join("\n")
    }
}

pub fn config_show(config: ResolvedConfig) -> ConfigShowResult {
    ConfigShowResult { config }
}

/// Result of `config init`.
#[derive(Debug, Serialize)]
pub struct ConfigInitResult {
    pub path: PathBuf,
    pub written: bool,
}

impl Output for ConfigInitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Wrote {}", self.path.display())
    }
}

/// Write the resolved settings to the config file.
pub fn config_init(config: &ResolvedConfig, force: bool) -> Result<ConfigInitResult> {
    let Some(path) = config.config_path.clone() else {
        return Err(Error::Config(
            "No config directory found; pass --config".to_string(),
        ));
    };
    if path.exists() && !force {
        return Err(Error::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    let mut file = load_config(&path)?;
    file.merge(&TektreeConfig {
        tree_pagination_limit: Some(config.page_size() as u64),
        output_verbosity_level: Some(config.verbosity()),
        tkn_path: config.tkn_path.as_ref().map(|r| r.value.clone()),
        kubectl_path: config.kubectl_path.as_ref().map(|r| r.value.clone()),
        command_timeout: Some(config.command_timeout.value),
        watch_debounce_ms: Some(config.watch_debounce_ms.value),
    });
    write_config(&path, &file)?;
    Ok(ConfigInitResult { path, written: true })
}

/// Result of `version`.
#[derive(Debug, Serialize)]
pub struct VersionResult {
    pub version: String,
    pub commit: String,
    pub built: String,
    pub tkn: Option<String>,
}

impl Output for VersionResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "tektree {} ({}, built {})",
            self.version, self.commit, self.built
        )];
        match &self.tkn {
            Some(tkn) => lines.push(tkn.clone()),
            None => lines.push("tkn: not available".to_string()),
        }
        lines.join("\n")
    }
}

pub async fn version(executor: &dyn Executor, verbosity: u32) -> VersionResult {
    let exit = executor
        .execute(&Command::print_tkn_version().with_verbosity(verbosity))
        .await;
    let tkn = if exit.succeeded {
        Some(exit.stdout.trim().to_string())
    } else {
        tracing::debug!(error = %exit.diagnostic(), "tkn version unavailable");
        None
    };
    VersionResult {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("TEKTREE_GIT_COMMIT").to_string(),
        built: env!("TEKTREE_BUILD_TIMESTAMP").to_string(),
        tkn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolver::resolve_with;
    use crate::config::ConfigOverrides;
    use crate::executor::ExitData;
    use crate::explorer::ExplorerOptions;
    use crate::testing::FakeExecutor;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;

    const CAN_I: &str = "kubectl auth can-i create pipeline.tekton.dev";
    const RUNS: &str = "kubectl get pipelinerun -o json";

    fn explorer(page_size: usize) -> (Arc<FakeExecutor>, Explorer) {
        let fake = Arc::new(FakeExecutor::new());
        fake.respond(CAN_I, ExitData::success("yes\n"));
        let options = ExplorerOptions {
            page_size,
            ..Default::default()
        };
        (fake.clone(), Explorer::new(fake, options))
    }

    fn runs(count: usize) -> serde_json::Value {
        let items: Vec<_> = (0..count)
            .map(|i| {
                json!({
                    "metadata": {
                        "name": format!("run-{:02}", i),
                        "creationTimestamp": format!("2024-01-01T00:{:02}:00Z", i)
                    },
                    "status": {"conditions": [{"status": "True"}],
                               "completionTime": format!("2024-01-01T00:{:02}:30Z", i)}
                })
            })
            .collect();
        json!(items)
    }

    // ==== Tree Tests ====

    #[tokio::test]
    async fn test_tree_depth_zero_lists_categories() {
        let (_fake, explorer) = explorer(5);
        let view = tree(&explorer, 0).await;
        assert_eq!(view.nodes.len(), 11);
        assert_eq!(view.nodes[1].label, "PipelineRuns");
        assert!(view.nodes.iter().all(|n| n.children.is_empty()));
        assert!(view.to_human().starts_with("Pipelines\nPipelineRuns"));
    }

    #[tokio::test]
    async fn test_tree_denied_is_single_placeholder() {
        let fake = Arc::new(FakeExecutor::new());
        fake.respond(CAN_I, ExitData::failure("no\n", "exit status 1"));
        let explorer = Explorer::new(fake, ExplorerOptions::default());
        let view = tree(&explorer, 2).await;
        assert_eq!(view.nodes.len(), 1);
        assert_eq!(view.nodes[0].kind, "placeholder");
        assert!(view.to_human().starts_with("! The current user"));
    }

    #[tokio::test]
    async fn test_tree_depth_one_paginates_runs() {
        let (fake, explorer) = explorer(2);
        fake.respond_items(RUNS, runs(3));
        let view = tree(&explorer, 1).await;
        let run_list = &view.nodes[1];
        assert_eq!(run_list.children.len(), 3);
        assert_eq!(run_list.children[0].label, "run-02");
        assert_eq!(run_list.children[2].kind, "more");
        assert_eq!(run_list.children[2].description.as_deref(), Some("1 from 3"));
    }

    // ==== Children Tests ====

    #[tokio::test]
    async fn test_children_reveals_pages() {
        let (fake, explorer) = explorer(2);
        fake.respond_items(RUNS, runs(5));
        let path = vec!["PipelineRuns".to_string()];

        let first = children(&explorer, &path, 1).await.unwrap();
        assert_eq!(first.children.len(), 3);

        let all = children(&explorer, &path, 3).await.unwrap();
        assert_eq!(all.path, ["PipelineRuns"]);
        assert_eq!(all.children.len(), 5);
        assert!(all.children.iter().all(|c| c.kind == "node"));
    }

    #[tokio::test]
    async fn test_children_unknown_path() {
        let (_fake, explorer) = explorer(5);
        let err = children(&explorer, &["Nope".to_string()], 1).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_children_human_lists_states() {
        let (fake, explorer) = explorer(5);
        fake.respond_items(RUNS, runs(1));
        let view = children(&explorer, &["PipelineRuns".to_string()], 1).await.unwrap();
        let human = view.to_human();
        assert!(human.contains("run-00 [Succeeded] - started"));
        assert!(human.contains("finished in 30s"));
    }

    // ==== Watch Tests ====

    #[tokio::test]
    async fn test_watch_emits_initial_frame_and_stops() {
        let (_fake, explorer) = explorer(5);
        let mut frames = Vec::new();
        watch(&explorer, 0, async {}, |frame| frames.push(frame.to_json()))
            .await
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains(r#""event":"tree""#));
    }

    #[tokio::test]
    async fn test_watch_rerenders_on_node_refresh() {
        let (fake, explorer) = explorer(5);
        fake.respond_items(RUNS, runs(1));
        let explorer = Arc::new(explorer);
        let trigger = explorer.clone();
        let shutdown = async move {
            tokio::task::yield_now().await;
            let runs_node = trigger.category_nodes()[1].clone();
            trigger.refresh(Some(&runs_node));
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        };

        let mut frames = Vec::new();
        watch(&explorer, 1, shutdown, |frame| frames.push(frame.to_json()))
            .await
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames[1].contains(r#""event":"node""#));
        assert!(frames[1].contains(r#""path":["PipelineRuns"]"#));
        assert_eq!(fake.call_count(RUNS), 2);
    }

    #[tokio::test]
    async fn test_rerender_keeps_revealed_pages() {
        let (fake, explorer) = explorer(1);
        fake.respond_items(RUNS, runs(1));
        let task_runs: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|n| json!({"metadata": {"name": format!("run-00-{}", n)}}))
            .collect();
        fake.respond_items(
            "kubectl get taskrun -l tekton.dev/pipelineRun=run-00 -o json",
            json!(task_runs),
        );

        let before = render_tree(&explorer, 2, &[]).await;
        let run = &before[1].children[0];
        assert_eq!(run.children.len(), 2);
        run.item.as_node().unwrap().reveal_more(1);

        let after = render_tree(&explorer, 2, &before).await;
        let run = &after[1].children[0];
        assert!(!Arc::ptr_eq(
            run.item.as_node().unwrap(),
            before[1].children[0].item.as_node().unwrap()
        ));
        assert_eq!(run.children.len(), 3);
        assert_eq!(run.children[2].item.label(), "more");
    }

    // ==== Start and Resources Tests ====

    fn start_args(name: &str, resources: &[(&str, &str)]) -> StartArgs {
        StartArgs {
            name: name.to_string(),
            resources: resources
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            params: vec![("level".to_string(), "2".to_string())],
            workspaces: Vec::new(),
            service_account: None,
            dry_run: true,
        }
    }

    fn task_definition() -> String {
        json!({
            "metadata": {"name": "build"},
            "spec": {"resources": {
                "inputs": [{"name": "source", "type": "git"}],
                "outputs": [{"name": "image", "type": "image"}]
            }}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_start_task_dry_run_assigns_directions() {
        let fake = Arc::new(FakeExecutor::new());
        fake.respond("kubectl get task build -o json", ExitData::success(task_definition()));
        let fetcher = ResourceFetcher::new(fake.clone(), 0);
        let args = start_args("build", &[("image", "registry"), ("source", "repo")]);

        let result = start_task(&fetcher, &args, false).await.unwrap();
        assert!(!result.executed);
        assert_eq!(
            result.command,
            "tkn task start build -o image=registry -i source=repo --param level=2"
        );
        assert!(!fake.calls().iter().any(|c| c.starts_with("tkn task start")));
    }

    #[tokio::test]
    async fn test_start_task_unknown_resource() {
        let fake = Arc::new(FakeExecutor::new());
        fake.respond("kubectl get task build -o json", ExitData::success(task_definition()));
        let fetcher = ResourceFetcher::new(fake, 0);
        let err = start_task(&fetcher, &start_args("build", &[("cache", "x")]), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no resource named cache"));
    }

    const DEPLOY: &str = "kubectl get pipeline deploy -o json";

    fn pipeline_definition() -> String {
        json!({
            "metadata": {"name": "deploy"},
            "spec": {
                "resources": [{"name": "repo", "type": "git"}],
                "params": [
                    {"name": "level", "default": "1"},
                    {"name": "env", "default": "staging"},
                    {"name": "image"}
                ]
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_start_pipeline_runs_in_terminal() {
        let fake = Arc::new(FakeExecutor::new());
        fake.respond(DEPLOY, ExitData::success(pipeline_definition()));
        let fetcher = ResourceFetcher::new(fake.clone(), 0);
        let mut args = start_args("deploy", &[("repo", "git-main")]);
        args.dry_run = false;

        let result = start_pipeline(&fetcher, &args).await.unwrap();
        assert!(result.executed);
        assert_eq!(
            fake.calls(),
            [
                DEPLOY,
                "tkn pipeline start deploy --resource repo=git-main --param level=2 --param env=staging -s pipeline"
            ]
        );
    }

    #[tokio::test]
    async fn test_start_pipeline_unknown_resource() {
        let fake = Arc::new(FakeExecutor::new());
        fake.respond(DEPLOY, ExitData::success(pipeline_definition()));
        let fetcher = ResourceFetcher::new(fake.clone(), 0);

        let err = start_pipeline(&fetcher, &start_args("deploy", &[("cache", "x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("Pipeline deploy declares no resource named cache"));
        assert_eq!(fake.calls(), [DEPLOY]);
    }

    #[tokio::test]
    async fn test_start_pipeline_with_workspace_and_verbosity() {
        let fake = Arc::new(FakeExecutor::new());
        let fetcher = ResourceFetcher::new(fake, 2);
        let mut args = start_args("deploy", &[]);
        args.params.clear();
        args.workspaces = vec!["name=shared,claimName=pvc".parse().unwrap()];

        let result = start_pipeline(&fetcher, &args).await.unwrap();
        assert_eq!(
            result.command,
            "tkn pipeline start deploy -w name=shared,claimName=pvc -s pipeline -v 2"
        );
    }

    #[tokio::test]
    async fn test_resources_flattened() {
        let fake = Arc::new(FakeExecutor::new());
        fake.respond("kubectl get task build -o json", ExitData::success(task_definition()));
        let view = resources(&ResourceFetcher::new(fake, 0), "build", false).await.unwrap();
        assert_eq!(view.resources.len(), 2);
        assert_eq!(view.to_human(), "build:\n  source (git) inputs\n  image (image) outputs");
    }

    #[tokio::test]
    async fn test_logs_follow() {
        let fake = FakeExecutor::new();
        logs(&fake, RunKind::Taskrun, "tr-1", true, 3).await.unwrap();
        logs(&fake, RunKind::Pipelinerun, "pr-1", false, 3).await.unwrap();
        assert_eq!(
            fake.calls(),
            ["tkn taskrun logs tr-1 -f", "tkn pipelinerun logs pr-1 -v 3"]
        );
    }

    // ==== Config and Version Tests ====

    #[test]
    fn test_config_init_refuses_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.kdl");
        let mut resolved = resolve_with(
            &TektreeConfig::default(),
            None,
            &ConfigOverrides::new().with_page_size(4),
        );
        resolved.config_path = Some(path.clone());

        config_init(&resolved, false).unwrap();
        let written = crate::config::load_config(&path).unwrap();
        assert_eq!(written.tree_pagination_limit, Some(4));

        assert!(config_init(&resolved, false).is_err());
        assert!(config_init(&resolved, true).is_ok());
    }

    #[test]
    fn test_config_show_human_lists_sources() {
        let resolved = resolve_with(
            &TektreeConfig {
                command_timeout: Some(9),
                ..Default::default()
            },
            Some(Path::new("/tmp/t.kdl")),
            &ConfigOverrides::new(),
        );
        let human = config_show(resolved).to_human();
        assert!(human.contains("tree-pagination-limit: 5 (default)"));
        assert!(human.contains("command-timeout: 9s (config-file:/tmp/t.kdl)"));
    }

    #[tokio::test]
    async fn test_version_reports_tkn() {
        let fake = FakeExecutor::new();
        fake.respond("tkn version", ExitData::success("Client version: 0.9.0\n"));
        let result = version(&fake, 0).await;
        assert_eq!(result.tkn.as_deref(), Some("Client version: 0.9.0"));
        assert_eq!(result.version, env!("CARGO_PKG_VERSION"));
    }
}
