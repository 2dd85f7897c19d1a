//! Pagination of child lists with a "show more" continuation.

use crate::tree::{TreeItem, TreeNode};
use std::sync::{Arc, Weak};

/// Default number of children shown before a [`MoreNode`] is offered.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Synthetic entry standing in for the children past the pagination cursor.
#[derive(Debug, Clone)]
pub struct MoreNode {
    show_next: usize,
    total_count: usize,
    parent: Weak<TreeNode>,
}

impl MoreNode {
    /// How many more children selecting this node reveals.
    pub fn show_next(&self) -> usize {
        self.show_next
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn parent(&self) -> Option<Arc<TreeNode>> {
        self.parent.upgrade()
    }

    pub fn description(&self) -> String {
        format!("{} from {}", self.show_next, self.total_count)
    }

    pub fn tooltip(&self) -> String {
        format!("{} more from {}", self.show_next, self.total_count)
    }

    /// Advance the parent's cursor by `show_next`.
    ///
    /// Returns the parent so the caller can re-render it, or `None` if the
    /// parent has been superseded in the meantime.
    pub fn select(&self) -> Option<Arc<TreeNode>> {
        let parent = self.parent()?;
        let visible = parent.reveal_more(self.show_next);
        tracing::debug!(parent = %parent.name(), visible, "revealed more children");
        Some(parent)
    }
}

/// Clip `children` to the context node's cursor, appending a [`MoreNode`]
/// when some remain hidden.
pub fn limit_view(
    context: &Arc<TreeNode>,
    children: Vec<Arc<TreeNode>>,
    page_size: usize,
) -> Vec<TreeItem> {
    let page_size = page_size.max(1);
    let visible = context.ensure_visible_children(page_size);
    let total = children.len();

    let mut items: Vec<TreeItem> = children
        .into_iter()
        .take(visible)
        .map(TreeItem::Node)
        .collect();

    if visible < total {
        items.push(TreeItem::More(MoreNode {
            show_next: page_size.min(total - visible),
            total_count: total,
            parent: Arc::downgrade(context),
        }));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Category;

    fn runs(parent: &Arc<TreeNode>, count: usize) -> Vec<Arc<TreeNode>> {
        (0..count)
            .map(|i| {
                Arc::new(TreeNode::new(
                    format!("run-{:02}", i),
                    Category::PipelineRun,
                    Some(parent),
                ))
            })
            .collect()
    }

    fn more(items: &[TreeItem]) -> Option<&MoreNode> {
        items.last().and_then(TreeItem::as_more)
    }

    #[test]
    fn test_three_pages_of_twelve() {
        let parent = Arc::new(TreeNode::new("PipelineRuns", Category::PipelineRunList, None));

        let page = limit_view(&parent, runs(&parent, 12), 5);
        assert_eq!(page.len(), 6);
        let m = more(&page).unwrap();
        assert_eq!((m.show_next(), m.total_count()), (5, 12));

        m.select().unwrap();
        assert_eq!(parent.visible_children(), Some(10));
        let page = limit_view(&parent, runs(&parent, 12), 5);
        assert_eq!(page.len(), 11);
        let m = more(&page).unwrap();
        assert_eq!(m.show_next(), 2);

        m.select().unwrap();
        let page = limit_view(&parent, runs(&parent, 12), 5);
        assert_eq!(page.len(), 12);
        assert!(more(&page).is_none());
    }

    #[test]
    fn test_empty_list_has_no_more_node() {
        let parent = Arc::new(TreeNode::new("Tasks", Category::TaskList, None));
        assert!(limit_view(&parent, Vec::new(), 5).is_empty());
        assert_eq!(parent.visible_children(), Some(5));
    }

    #[test]
    fn test_exact_page_has_no_more_node() {
        let parent = Arc::new(TreeNode::new("Tasks", Category::TaskList, None));
        let page = limit_view(&parent, runs(&parent, 5), 5);
        assert_eq!(page.len(), 5);
        assert!(page.iter().all(|item| item.as_node().is_some()));
    }

    #[test]
    fn test_more_node_texts() {
        let parent = Arc::new(TreeNode::new("TaskRuns", Category::TaskRunList, None));
        let page = limit_view(&parent, runs(&parent, 7), 5);
        let m = more(&page).unwrap();
        assert_eq!(m.description(), "2 from 7");
        assert_eq!(m.tooltip(), "2 more from 7");
        assert_eq!(page.last().unwrap().label(), "more");
    }

    #[test]
    fn test_select_after_parent_dropped() {
        let parent = Arc::new(TreeNode::new("TaskRuns", Category::TaskRunList, None));
        let page = limit_view(&parent, runs(&parent, 7), 5);
        let m = more(&page).unwrap().clone();
        drop(page);
        drop(parent);
        assert!(m.select().is_none());
    }
}
