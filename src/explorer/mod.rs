//! Tree provider consumed by the rendering layer.
//!
//! The [`Explorer`] is the application context: it owns the root, the
//! top-level category list, the page size and the status poller. Every
//! failure reaching it is already a placeholder node, so none of its tree
//! operations return errors.

pub mod root;

use crate::executor::Executor;
use crate::fetch::{self, ResourceFetcher};
use crate::pagination::{self, MoreNode};
use crate::tree::{TreeItem, TreeNode};
use crate::watch::{CategoryNodes, DEFAULT_DEBOUNCE, RefreshEvent, StatusPoller};
use crate::{Error, Result};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Knobs the explorer reads from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplorerOptions {
    pub page_size: usize,
    pub verbosity: u32,
    pub debounce: Duration,
}

impl Default for ExplorerOptions {
    fn default() -> Self {
        Self {
            page_size: pagination::DEFAULT_PAGE_SIZE,
            verbosity: 0,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

pub struct Explorer {
    fetcher: ResourceFetcher,
    poller: StatusPoller,
    root: Arc<TreeNode>,
    categories: CategoryNodes,
    page_size: usize,
    events: broadcast::Sender<RefreshEvent>,
}

impl Explorer {
    pub fn new(executor: Arc<dyn Executor>, options: ExplorerOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let categories: CategoryNodes = Arc::new(OnceLock::new());
        Self {
            fetcher: ResourceFetcher::new(executor.clone(), options.verbosity),
            poller: StatusPoller::new(executor, events.clone(), categories.clone(), options.debounce),
            root: TreeNode::root(),
            categories,
            page_size: options.page_size.max(1),
            events,
        }
    }

    pub fn root(&self) -> &Arc<TreeNode> {
        &self.root
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn fetcher(&self) -> &ResourceFetcher {
        &self.fetcher
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    /// Top-level category nodes; empty until the root has been expanded on a
    /// healthy cluster.
    pub fn category_nodes(&self) -> &[Arc<TreeNode>] {
        self.categories.get().map(Vec::as_slice).unwrap_or_default()
    }

    /// Children of the root: the category list, or a single placeholder if
    /// the health check fails.
    pub async fn root_children(&self) -> Vec<TreeItem> {
        let status = root::check_cluster(self.fetcher.executor().as_ref()).await;
        if let Some(message) = status.message() {
            self.poller.cancel_all();
            return vec![TreeItem::Node(TreeNode::placeholder(message, Some(&self.root)))];
        }
        self.categories
            .get_or_init(|| root::assemble(&self.root))
            .iter()
            .cloned()
            .map(TreeItem::Node)
            .collect()
    }

    /// Re-fetch the children of `node`, paginating run lists.
    pub async fn get_children(&self, node: &Arc<TreeNode>) -> Vec<TreeItem> {
        if node.is_root() {
            return self.root_children().await;
        }
        let Some(listing) = fetch::listing_for(node) else {
            return Vec::new();
        };
        let children = self.fetcher.fetch_listing(&listing, node).await;
        self.poller.track(node, &children);
        if listing.paginated {
            pagination::limit_view(node, children, self.page_size)
        } else {
            children.into_iter().map(TreeItem::Node).collect()
        }
    }

    /// Displayed parent: `None` for the root and for top-level categories.
    pub fn get_parent(&self, node: &TreeNode) -> Option<Arc<TreeNode>> {
        node.parent().filter(|p| !p.is_root())
    }

    /// Reveal the next page under a [`MoreNode`] and ask for its parent to be
    /// re-rendered.
    pub fn select_more(&self, more: &MoreNode) -> Option<Arc<TreeNode>> {
        let parent = more.select()?;
        self.refresh(Some(&parent));
        Some(parent)
    }

    /// Request a re-query of one subtree, or of the whole tree.
    pub fn refresh(&self, node: Option<&Arc<TreeNode>>) {
        let event = match node {
            Some(node) if !node.is_root() => RefreshEvent::Node(node.clone()),
            _ => RefreshEvent::Tree,
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    /// Resolve a path of labels (or names) from the top-level categories down.
    ///
    /// Returns the chain from the root to the target, which keeps every
    /// ancestor alive for as long as the caller holds it. Every page is
    /// searched, whatever the pagination cursor says.
    pub async fn find(&self, path: &[String]) -> Result<Vec<Arc<TreeNode>>> {
        let mut chain = vec![self.root.clone()];
        for segment in path {
            let parent = chain[chain.len() - 1].clone();
            let candidates: Vec<Arc<TreeNode>> = if parent.is_root() {
                self.root_children()
                    .await
                    .into_iter()
                    .filter_map(|item| item.as_node().cloned())
                    .collect()
            } else {
                self.fetcher.fetch(&parent).await
            };
            let found = candidates
                .iter()
                .find(|n| !n.is_placeholder() && (n.name() == segment || n.label() == segment));
            match found {
                Some(node) => chain.push(node.clone()),
                None => {
                    if let Some(placeholder) = candidates.iter().find(|n| n.is_placeholder()) {
                        return Err(Error::Other(placeholder.name().to_string()));
                    }
                    return Err(Error::NotFound(path.join("/")));
                }
            }
        }
        Ok(chain)
    }

    /// Cancel every watch; the explorer stays usable.
    pub fn shutdown(&self) {
        self.poller.cancel_all();
    }
}
