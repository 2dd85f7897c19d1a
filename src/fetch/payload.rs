//! JSON payloads returned by `kubectl get ... -o json`.
//!
//! Parsing is lenient: anything that does not match the expected shape is
//! dropped rather than reported.

use crate::protocol::start::ResourceDirection;
use crate::tree::RunState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Label carrying the pipeline-task name a task-run was created for.
pub const PIPELINE_TASK_LABEL: &str = "tekton.dev/pipelineTask";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "creationTimestamp")]
    pub creation_timestamp: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, rename = "completionTime")]
    pub completion_time: Option<String>,
}

/// One entry of the `items` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceItem {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub spec: Option<Value>,
}

impl ResourceItem {
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn state(&self) -> Option<RunState> {
        let status = self.status.as_ref()?.conditions.first()?.status.as_deref()?;
        RunState::from_status(status)
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.metadata.creation_timestamp.as_deref())
    }

    pub fn completion_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.status.as_ref()?.completion_time.as_deref())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Read the `items` array out of a command's stdout.
///
/// Output that is not JSON, lacks `items`, or contains items without a
/// `metadata.name` yields fewer (possibly zero) items, never an error.
pub fn parse_items(stdout: &str) -> Vec<ResourceItem> {
    let document: Value = match serde_json::from_str(stdout) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "output is not JSON, treating as empty");
            return Vec::new();
        }
    };
    let Some(items) = document.get("items").and_then(Value::as_array) else {
        tracing::debug!("output has no items array, treating as empty");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|raw| match ResourceItem::deserialize(raw) {
            Ok(item) if item.name().is_some() => Some(item),
            Ok(_) => {
                tracing::debug!("skipping item without metadata.name");
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed item");
                None
            }
        })
        .collect()
}

/// A declared resource slot (`spec.resources.inputs[]` and friends).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeclaration {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    /// The declared default as a `--param` value. Array defaults are
    /// comma-joined the way tkn reads them.
    pub fn default_arg(&self) -> Option<String> {
        match self.default.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(values) => Some(
                values
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskResources {
    #[serde(default)]
    pub inputs: Vec<ResourceDeclaration>,
    #[serde(default)]
    pub outputs: Vec<ResourceDeclaration>,
}

/// `spec` of a task or cluster task.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub resources: Option<TaskResources>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

/// `spec` of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub resources: Vec<ResourceDeclaration>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

/// A task resource slot tagged with the side it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResource {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    pub direction: ResourceDirection,
}

/// Flatten `{inputs: [...], outputs: [...]}` into one list, inputs first.
pub fn flatten_task_resources(spec: &TaskSpec) -> Vec<TaskResource> {
    let Some(resources) = &spec.resources else {
        return Vec::new();
    };
    let tagged = |decls: &[ResourceDeclaration], direction| {
        decls
            .iter()
            .map(|d| TaskResource {
                name: d.name.clone(),
                resource_type: d.resource_type.clone(),
                direction,
            })
            .collect::<Vec<_>>()
    };
    let mut flat = tagged(&resources.inputs, ResourceDirection::Inputs);
    flat.extend(tagged(&resources.outputs, ResourceDirection::Outputs));
    flat
}
