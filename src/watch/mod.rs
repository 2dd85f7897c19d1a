//! Status poller: watches runs that are still in progress and asks for
//! refreshes when they change.
//!
//! Each watch is a long-lived `kubectl get <kind> <name> -w` process owned by
//! a [`WatchHandle`]. Cancelling or dropping the handle kills the process.

use crate::{Error, Result};
use crate::executor::{Executor, WatchStream};
use crate::protocol::Command;
use crate::tree::{Category, NodeKey, TreeNode};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default quiet period after the last watch line before a refresh fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// A request to re-query part of the tree.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// Re-query everything below the root.
    Tree,
    /// Re-query the children of one node.
    Node(Arc<TreeNode>),
}

/// Owner of one running watch.
#[derive(Debug)]
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The node a watch reports on; swapped when a re-fetch produces a new instance.
type Target = Arc<Mutex<Weak<TreeNode>>>;

struct ActiveWatch {
    target: Target,
    handle: WatchHandle,
}

/// Top-level category nodes, set once the root has been assembled.
pub type CategoryNodes = Arc<OnceLock<Vec<Arc<TreeNode>>>>;

/// Attaches watches to transient runs and turns watch output into
/// [`RefreshEvent`]s.
pub struct StatusPoller {
    executor: Arc<dyn Executor>,
    events: broadcast::Sender<RefreshEvent>,
    categories: CategoryNodes,
    debounce: Duration,
    watches: Mutex<HashMap<NodeKey, ActiveWatch>>,
}

impl StatusPoller {
    pub fn new(
        executor: Arc<dyn Executor>,
        events: broadcast::Sender<RefreshEvent>,
        categories: CategoryNodes,
        debounce: Duration,
    ) -> Self {
        Self {
            executor,
            events,
            categories,
            debounce,
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Reconcile watches for a fresh fetch of `parent`'s children.
    ///
    /// Live watches on runs that are still transient are kept and re-pointed
    /// at the new instance; watches on runs that disappeared or finished are
    /// cancelled; newly transient runs get a watch.
    pub fn track(&self, parent: &TreeNode, nodes: &[Arc<TreeNode>]) {
        let parent_path = parent.path();
        let mut transient: HashMap<NodeKey, &Arc<TreeNode>> = nodes
            .iter()
            .filter(|n| n.is_transient() && n.category().watch_resource().is_some())
            .map(|n| (n.key(), n))
            .collect();

        let mut watches = self.watches.lock().unwrap_or_else(PoisonError::into_inner);
        watches.retain(|key, watch| {
            if key.parent_path != parent_path {
                return true;
            }
            if watch.handle.is_finished() {
                // Still-transient runs are restarted below.
                return false;
            }
            match transient.remove(key) {
                Some(node) => {
                    *watch.target.lock().unwrap_or_else(PoisonError::into_inner) =
                        Arc::downgrade(node);
                    true
                }
                None => {
                    tracing::debug!(node = %key, "cancelling watch");
                    false
                }
            }
        });

        for (key, node) in transient {
            match self.start(node) {
                Ok(watch) => {
                    watches.insert(key, watch);
                }
                Err(e) => tracing::warn!(node = %key, error = %e, "failed to start watch"),
            }
        }
    }

    /// Watch a single node outside the registry.
    pub fn watch(&self, node: &Arc<TreeNode>) -> Result<WatchHandle> {
        Ok(self.start(node)?.handle)
    }

    /// Keys of the watches currently registered, sorted.
    pub fn active_watches(&self) -> Vec<NodeKey> {
        let watches = self.watches.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = watches
            .iter()
            .filter(|(_, w)| !w.handle.is_finished())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn cancel_all(&self) {
        let mut watches = self.watches.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(count = watches.len(), "cancelling all watches");
        watches.clear();
    }

    fn start(&self, node: &Arc<TreeNode>) -> Result<ActiveWatch> {
        let resource = node.category().watch_resource().ok_or_else(|| {
            Error::InvalidInput(format!("{} nodes cannot be watched", node.category()))
        })?;
        let stream = self
            .executor
            .watch(&Command::watch_resource(resource, node.name()))?;
        let target: Target = Arc::new(Mutex::new(Arc::downgrade(node)));
        let notifier = Notifier {
            target: target.clone(),
            category: node.category(),
            events: self.events.clone(),
            categories: self.categories.clone(),
        };
        tracing::debug!(node = %node.key(), "watching run");
        let task = tokio::spawn(run_watch(stream, notifier, self.debounce));
        Ok(ActiveWatch {
            target,
            handle: WatchHandle { task },
        })
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

struct Notifier {
    target: Target,
    category: Category,
    events: broadcast::Sender<RefreshEvent>,
    categories: CategoryNodes,
}

impl Notifier {
    fn node(&self) -> Option<Arc<TreeNode>> {
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    fn send(&self, event: RefreshEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn changed(&self) {
        let Some(node) = self.node() else {
            return;
        };
        if self.category == Category::TaskRun {
            match node.parent() {
                Some(parent) => self.send(RefreshEvent::Node(parent)),
                None => self.send(RefreshEvent::Tree),
            }
            return;
        }
        self.send(RefreshEvent::Node(node));
        if let Some(categories) = self.categories.get() {
            for view in self.category.dependent_views() {
                for category_node in categories.iter().filter(|c| c.category() == *view) {
                    self.send(RefreshEvent::Node(category_node.clone()));
                }
            }
        }
    }

    fn exited(&self) {
        let parent = match self.category {
            Category::TaskRun => self.node().and_then(|n| n.parent()),
            _ => None,
        };
        match parent {
            Some(parent) => self.send(RefreshEvent::Node(parent)),
            None => self.send(RefreshEvent::Tree),
        }
    }
}

async fn run_watch(mut stream: WatchStream, notifier: Notifier, debounce: Duration) {
    let mut seen_output = false;
    let mut pending = false;
    let mut last_line = Instant::now();

    loop {
        let wait = debounce.saturating_sub(last_line.elapsed());
        tokio::select! {
            line = stream.next() => match line {
                Some(_) => {
                    seen_output = true;
                    pending = true;
                    last_line = Instant::now();
                }
                None => break,
            },
            _ = tokio::time::sleep(wait), if pending => {
                pending = false;
                notifier.changed();
            }
        }
    }

    // A watch that never printed failed to start; refreshing would restart it.
    if seen_output {
        notifier.exited();
    } else {
        tracing::warn!(category = %notifier.category, "watch exited without output");
    }
}
