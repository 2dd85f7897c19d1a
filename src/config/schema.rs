//! KDL schema for config.kdl.

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// tree-pagination-limit 5
/// output-verbosity-level 0
/// tkn-path "/usr/local/bin/tkn"
/// kubectl-path "/usr/local/bin/kubectl"
/// command-timeout 60
/// watch-debounce-ms 100
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TektreeConfig {
    /// Children shown before a "more" node is offered
    pub tree_pagination_limit: Option<u64>,

    /// Appended as `-v <level>` to outgoing commands when above zero
    pub output_verbosity_level: Option<u32>,

    pub tkn_path: Option<PathBuf>,

    pub kubectl_path: Option<PathBuf>,

    /// Seconds a captured command may run
    pub command_timeout: Option<u64>,

    pub watch_debounce_ms: Option<u64>,
}

fn string_value(doc: &KdlDocument, key: &str) -> Result<Option<String>, String> {
    let Some(node) = doc.get(key) else {
        return Ok(None);
    };
    match node.entries().first().map(|e| e.value()) {
        Some(KdlValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("{} must be a string, got {}", key, other)),
        None => Err(format!("{} is missing a value", key)),
    }
}

fn integer_value(doc: &KdlDocument, key: &str) -> Result<Option<u64>, String> {
    let Some(node) = doc.get(key) else {
        return Ok(None);
    };
    let Some(value) = node.entries().first().map(|e| e.value()) else {
        return Err(format!("{} is missing a value", key));
    };
    let Some(i) = value.as_integer() else {
        return Err(format!("{} must be an integer, got {}", key, value));
    };
    u64::try_from(i)
        .map(Some)
        .map_err(|_| format!("{} must not be negative, got {}", key, i))
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}

impl TektreeConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tree_pagination_limit == Some(0) {
            return Err("tree-pagination-limit must be at least 1".to_string());
        }
        if self.command_timeout == Some(0) {
            return Err("command-timeout must be at least 1 second".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Unknown nodes are ignored; known nodes with the wrong value type are
    /// an error.
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self, String> {
        let verbosity = integer_value(doc, "output-verbosity-level")?
            .map(|v| {
                u32::try_from(v).map_err(|_| format!("output-verbosity-level is too large: {}", v))
            })
            .transpose()?;

        Ok(Self {
            tree_pagination_limit: integer_value(doc, "tree-pagination-limit")?,
            output_verbosity_level: verbosity,
            tkn_path: string_value(doc, "tkn-path")?.map(PathBuf::from),
            kubectl_path: string_value(doc, "kubectl-path")?.map(PathBuf::from),
            command_timeout: integer_value(doc, "command-timeout")?,
            watch_debounce_ms: integer_value(doc, "watch-debounce-ms")?,
        })
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        let integers = [
            ("tree-pagination-limit", self.tree_pagination_limit),
            (
                "output-verbosity-level",
                self.output_verbosity_level.map(u64::from),
            ),
        ];
        for (name, value) in integers {
            if let Some(v) = value {
                push_node(&mut doc, name, KdlValue::Integer(v as i128));
            }
        }

        for (name, path) in [("tkn-path", &self.tkn_path), ("kubectl-path", &self.kubectl_path)] {
            if let Some(path) = path {
                push_node(
                    &mut doc,
                    name,
                    KdlValue::String(path.to_string_lossy().into_owned()),
                );
            }
        }

        let integers = [
            ("command-timeout", self.command_timeout),
            ("watch-debounce-ms", self.watch_debounce_ms),
        ];
        for (name, value) in integers {
            if let Some(v) = value {
                push_node(&mut doc, name, KdlValue::Integer(v as i128));
            }
        }

        doc.autoformat();
        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &TektreeConfig) {
        if other.tree_pagination_limit.is_some() {
            self.tree_pagination_limit = other.tree_pagination_limit;
        }
        if other.output_verbosity_level.is_some() {
            self.output_verbosity_level = other.output_verbosity_level;
        }
        if other.tkn_path.is_some() {
            self.tkn_path = other.tkn_path.clone();
        }
        if other.kubectl_path.is_some() {
            self.kubectl_path = other.kubectl_path.clone();
        }
        if other.command_timeout.is_some() {
            self.command_timeout = other.command_timeout;
        }
        if other.watch_debounce_ms.is_some() {
            self.watch_debounce_ms = other.watch_debounce_ms;
        }
    }
}
