//! Tree node model.
//!
//! Nodes never own their children. A parent is held as a [`Weak`] back
//! reference, and children are produced on demand by the fetcher, so each
//! fetch yields fresh node instances.

use crate::pagination::MoreNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Root,
    PipelineList,
    PipelineRunList,
    TaskList,
    ClusterTaskList,
    TaskRunList,
    PipelineResourceList,
    TriggerTemplateList,
    TriggerBindingList,
    EventListenerList,
    ConditionList,
    ClusterTriggerBindingList,
    Pipeline,
    PipelineRun,
    Task,
    TaskRun,
    ClusterTask,
    PipelineResource,
    TriggerTemplate,
    TriggerBinding,
    ClusterTriggerBinding,
    EventListener,
    Condition,
    Unavailable,
}

/// Top-level categories in display order.
pub const ROOT_CATEGORIES: [Category; 11] = [
    Category::PipelineList,
    Category::PipelineRunList,
    Category::TaskList,
    Category::ClusterTaskList,
    Category::TaskRunList,
    Category::PipelineResourceList,
    Category::TriggerTemplateList,
    Category::TriggerBindingList,
    Category::EventListenerList,
    Category::ConditionList,
    Category::ClusterTriggerBindingList,
];

impl Category {
    /// The lexical tag, also used as the primary sort key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Root => "root",
            Category::PipelineList => "pipeline-list",
            Category::PipelineRunList => "pipeline-run-list",
            Category::TaskList => "task-list",
            Category::ClusterTaskList => "cluster-task-list",
            Category::TaskRunList => "task-run-list",
            Category::PipelineResourceList => "pipeline-resource-list",
            Category::TriggerTemplateList => "trigger-template-list",
            Category::TriggerBindingList => "trigger-binding-list",
            Category::EventListenerList => "event-listener-list",
            Category::ConditionList => "condition-list",
            Category::ClusterTriggerBindingList => "cluster-trigger-binding-list",
            Category::Pipeline => "pipeline",
            Category::PipelineRun => "pipeline-run",
            Category::Task => "task",
            Category::TaskRun => "task-run",
            Category::ClusterTask => "cluster-task",
            Category::PipelineResource => "pipeline-resource",
            Category::TriggerTemplate => "trigger-template",
            Category::TriggerBinding => "trigger-binding",
            Category::ClusterTriggerBinding => "cluster-trigger-binding",
            Category::EventListener => "event-listener",
            Category::Condition => "condition",
            Category::Unavailable => "unavailable",
        }
    }

    /// Display name of a top-level category node.
    pub fn list_title(&self) -> Option<&'static str> {
        let title = match self {
            Category::PipelineList => "Pipelines",
            Category::PipelineRunList => "PipelineRuns",
            Category::TaskList => "Tasks",
            Category::ClusterTaskList => "ClusterTasks",
            Category::TaskRunList => "TaskRuns",
            Category::PipelineResourceList => "PipelineResources",
            Category::TriggerTemplateList => "TriggerTemplates",
            Category::TriggerBindingList => "TriggerBinding",
            Category::EventListenerList => "EventListener",
            Category::ConditionList => "Conditions",
            Category::ClusterTriggerBindingList => "ClusterTriggerBinding",
            _ => return None,
        };
        Some(title)
    }

    pub fn is_list(&self) -> bool {
        self.list_title().is_some()
    }

    /// Pipeline-runs and task-runs carry state and sort newest first.
    pub fn is_run(&self) -> bool {
        matches!(self, Category::PipelineRun | Category::TaskRun)
    }

    /// Whether nodes of this category can have children.
    pub fn is_expandable(&self) -> bool {
        self.is_list()
            || matches!(
                self,
                Category::Root
                    | Category::Pipeline
                    | Category::PipelineRun
                    | Category::Task
                    | Category::ClusterTask
            )
    }

    /// Resource name passed to `kubectl get <resource> <name> -w`.
    pub fn watch_resource(&self) -> Option<&'static str> {
        match self {
            Category::PipelineRun => Some("pipelinerun"),
            Category::TaskRun => Some("taskrun"),
            _ => None,
        }
    }

    /// Top-level views whose content changes when a run of this category does.
    pub fn dependent_views(&self) -> &'static [Category] {
        match self {
            Category::PipelineRun => &[
                Category::TaskRunList,
                Category::ClusterTaskList,
                Category::TaskList,
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Category {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/// Condition status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    #[serde(rename = "True")]
    Succeeded,
    #[serde(rename = "False")]
    Failed,
    #[serde(rename = "Unknown")]
    Running,
}

impl RunState {
    /// Parse `status.conditions[0].status`.
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "True" => Some(RunState::Succeeded),
            "False" => Some(RunState::Failed),
            "Unknown" => Some(RunState::Running),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Succeeded => "True",
            RunState::Failed => "False",
            RunState::Running => "Unknown",
        }
    }
}

/// Identity of a node that survives re-fetches: `(parent path, category, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub parent_path: Vec<String>,
    pub category: Category,
    pub name: String,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.parent_path {
            write!(f, "{}/", segment)?;
        }
        write!(f, "{} ({})", self.name, self.category)
    }
}

/// A node in the resource tree.
#[derive(Debug)]
pub struct TreeNode {
    name: String,
    category: Category,
    parent: Option<Weak<TreeNode>>,
    creation_time: Option<DateTime<Utc>>,
    completion_time: Option<DateTime<Utc>>,
    state: Option<RunState>,
    short_name: Option<String>,
    /// Pagination cursor; zero means unset.
    visible_children: AtomicUsize,
}

impl TreeNode {
    pub fn new(name: impl Into<String>, category: Category, parent: Option<&Arc<TreeNode>>) -> Self {
        Self {
            name: name.into(),
            category,
            parent: parent.map(Arc::downgrade),
            creation_time: None,
            completion_time: None,
            state: None,
            short_name: None,
            visible_children: AtomicUsize::new(0),
        }
    }

    /// The singleton root of a tree.
    pub fn root() -> Arc<TreeNode> {
        Arc::new(Self::new("root", Category::Root, None))
    }

    /// An error stand-in carrying a diagnostic as its name.
    pub fn placeholder(diagnostic: impl Into<String>, parent: Option<&Arc<TreeNode>>) -> Arc<TreeNode> {
        Arc::new(Self::new(diagnostic, Category::Unavailable, parent))
    }

    pub fn with_state(mut self, state: Option<RunState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_times(
        mut self,
        creation: Option<DateTime<Utc>>,
        completion: Option<DateTime<Utc>>,
    ) -> Self {
        self.creation_time = creation;
        self.completion_time = completion;
        self
    }

    pub fn with_short_name(mut self, short_name: Option<String>) -> Self {
        self.short_name = short_name;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn state(&self) -> Option<RunState> {
        self.state
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_time
    }

    pub fn completion_time(&self) -> Option<DateTime<Utc>> {
        self.completion_time
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    /// Display label: the pipeline-task name if known, otherwise the name.
    pub fn label(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }

    /// A run that has not reached a terminal state.
    pub fn is_transient(&self) -> bool {
        self.state == Some(RunState::Running)
    }

    pub fn is_root(&self) -> bool {
        self.category == Category::Root
    }

    pub fn is_placeholder(&self) -> bool {
        self.category == Category::Unavailable
    }

    /// The producing parent, if it is still alive.
    pub fn parent(&self) -> Option<Arc<TreeNode>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Names from the top-level category down to this node; the root is omitted.
    pub fn path(&self) -> Vec<String> {
        let mut path = Vec::new();
        if !self.is_root() {
            path.push(self.name.clone());
        }
        let mut current = self.parent();
        while let Some(node) = current {
            if node.is_root() {
                break;
            }
            path.push(node.name.clone());
            current = node.parent();
        }
        path.reverse();
        path
    }

    pub fn key(&self) -> NodeKey {
        let parent_path = self.parent().map(|p| p.path()).unwrap_or_default();
        NodeKey {
            parent_path,
            category: self.category,
            name: self.name.clone(),
        }
    }

    /// Current pagination cursor, `None` until first expansion.
    pub fn visible_children(&self) -> Option<usize> {
        match self.visible_children.load(Ordering::Acquire) {
            0 => None,
            n => Some(n),
        }
    }

    /// Initialize the cursor to `default` if unset and return its value.
    pub fn ensure_visible_children(&self, default: usize) -> usize {
        let default = default.max(1);
        match self
            .visible_children
            .compare_exchange(0, default, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => default,
            Err(current) => current,
        }
    }

    /// Advance the cursor by `count`; returns the new value.
    pub fn reveal_more(&self, count: usize) -> usize {
        self.visible_children.fetch_add(count, Ordering::AcqRel) + count
    }

    /// Take over another instance's cursor if it is further along.
    pub fn carry_pagination_from(&self, previous: &TreeNode) {
        let theirs = previous.visible_children.load(Ordering::Acquire);
        self.visible_children.fetch_max(theirs, Ordering::AcqRel);
    }
}

/// One entry in a rendered child list.
#[derive(Debug, Clone)]
pub enum TreeItem {
    Node(Arc<TreeNode>),
    More(MoreNode),
}

impl TreeItem {
    pub fn label(&self) -> &str {
        match self {
            TreeItem::Node(node) => node.label(),
            TreeItem::More(_) => "more",
        }
    }

    pub fn as_node(&self) -> Option<&Arc<TreeNode>> {
        match self {
            TreeItem::Node(node) => Some(node),
            TreeItem::More(_) => None,
        }
    }

    pub fn as_more(&self) -> Option<&MoreNode> {
        match self {
            TreeItem::More(more) => Some(more),
            TreeItem::Node(_) => None,
        }
    }
}
