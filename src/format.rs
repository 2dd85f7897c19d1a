//! Human-readable descriptions for tree nodes.

use crate::tree::{Category, TreeItem, TreeNode};
use chrono::{DateTime, Utc};

const UNITS: [(&str, u64); 7] = [
    ("y", 31_557_600_000),
    ("mo", 2_629_800_000),
    ("w", 604_800_000),
    ("d", 86_400_000),
    ("h", 3_600_000),
    ("m", 60_000),
    ("s", 1_000),
];

/// Index of the largest unit that fits in `ms`, or seconds.
fn largest_unit(ms: u64) -> usize {
    UNITS
        .iter()
        .position(|(_, size)| ms >= *size)
        .unwrap_or(UNITS.len() - 1)
}

/// Render a duration in milliseconds using at most the two largest units,
/// rounding the last one (`3_725_000` is `"1h 2m"`, `1_500` is `"2s"`).
pub fn humanize(ms: u64) -> String {
    let smallest = UNITS.len() - 1;
    let step = UNITS[(largest_unit(ms) + 1).min(smallest)].1;
    let rounded = (ms + step / 2) / step * step;

    // Rounding may carry into a larger unit.
    let first = largest_unit(rounded);
    let mut rest = rounded;
    let mut parts = Vec::with_capacity(2);
    for &(unit, size) in &UNITS[first..=(first + 1).min(smallest)] {
        let count = rest / size;
        rest %= size;
        if parts.is_empty() || count > 0 {
            parts.push(format!("{}{}", count, unit));
        }
    }
    parts.join(" ")
}

fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let ms = (to - from).num_milliseconds().max(0) as u64;
    humanize(ms)
}

/// Elapsed-time description of a run, relative to `now`.
///
/// Pipeline-runs, and task-runs listed under a namespaced task, show when
/// they started; task-runs elsewhere (cluster tasks included) only show
/// their duration.
pub fn describe_run(node: &TreeNode, now: DateTime<Utc>) -> Option<String> {
    let started = node.creation_time()?;
    let under_task = node
        .parent()
        .is_some_and(|p| p.category() == Category::Task);

    let text = match (node.category(), node.completion_time()) {
        (Category::PipelineRun, Some(finished)) => format!(
            "started {} ago, finished in {}",
            elapsed(started, now),
            elapsed(started, finished)
        ),
        (Category::PipelineRun, None) => format!("running for {}", elapsed(started, now)),
        (Category::TaskRun, Some(finished)) if under_task => format!(
            "started {} ago, finished in {}",
            elapsed(started, now),
            elapsed(started, finished)
        ),
        (Category::TaskRun, None) if under_task => format!(
            "started {} ago, running for {}",
            elapsed(started, now),
            elapsed(started, now)
        ),
        (Category::TaskRun, Some(finished)) => format!("finished in {}", elapsed(started, finished)),
        (Category::TaskRun, None) => format!("running for {}", elapsed(started, now)),
        _ => return None,
    };
    Some(text)
}

/// Secondary text shown next to an item's label.
pub fn description(item: &TreeItem, now: DateTime<Utc>) -> Option<String> {
    match item {
        TreeItem::Node(node) => describe_run(node, now),
        TreeItem::More(more) => Some(more.description()),
    }
}
