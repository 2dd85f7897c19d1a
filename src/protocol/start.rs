//! Start commands for tasks and pipelines.

use super::{CliCommand, Command};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default service account used when starting a pipeline without one.
pub const DEFAULT_PIPELINE_SERVICE_ACCOUNT: &str = "pipeline";

/// Which side of a task a resource binding feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDirection {
    Inputs,
    Outputs,
}

/// A resource binding `name=resource_ref` passed to a start command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResource {
    pub name: String,
    pub resource_ref: String,
    /// Only meaningful for task starts; pipeline starts ignore it.
    pub direction: Option<ResourceDirection>,
}

/// What backs a workspace binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkspaceSource {
    PersistentVolumeClaim {
        claim_name: String,
        sub_path: Option<String>,
    },
    ConfigMap {
        config: String,
        /// `key=path` projected from the map.
        item: Option<(String, String)>,
    },
    Secret {
        secret: String,
    },
    EmptyDir {
        medium: String,
    },
}

/// A `-w` workspace binding.
///
/// Written and parsed in tkn's own form, e.g.
/// `name=shared,claimName=pvc,subPath=src` or
/// `name=settings,config=app-config,item=app.conf=conf/app.conf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartWorkspace {
    pub name: String,
    pub source: WorkspaceSource,
}

impl fmt::Display for StartWorkspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name={}", self.name)?;
        match &self.source {
            WorkspaceSource::PersistentVolumeClaim {
                claim_name,
                sub_path,
            } => {
                write!(f, ",claimName={}", claim_name)?;
                if let Some(sub_path) = sub_path {
                    write!(f, ",subPath={}", sub_path)?;
                }
            }
            WorkspaceSource::ConfigMap { config, item } => {
                write!(f, ",config={}", config)?;
                if let Some((key, path)) = item {
                    write!(f, ",item={}={}", key, path)?;
                }
            }
            WorkspaceSource::Secret { secret } => write!(f, ",secret={}", secret)?,
            WorkspaceSource::EmptyDir { medium } => write!(f, ",emptyDir={}", medium)?,
        }
        Ok(())
    }
}

impl FromStr for StartWorkspace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut name = None;
        let mut claim_name = None;
        let mut sub_path = None;
        let mut config = None;
        let mut item = None;
        let mut secret = None;
        let mut medium = None;

        for part in s.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                return Err(format!("expected key=value in workspace, got '{}'", part));
            };
            let value = value.to_string();
            match key {
                "name" => name = Some(value),
                "claimName" => claim_name = Some(value),
                "subPath" => sub_path = Some(value),
                "config" => config = Some(value),
                "item" => match value.split_once('=') {
                    Some((k, p)) => item = Some((k.to_string(), p.to_string())),
                    None => return Err(format!("workspace item must be key=path, got '{}'", value)),
                },
                "secret" => secret = Some(value),
                "emptyDir" => medium = Some(value),
                other => return Err(format!("unknown workspace key '{}'", other)),
            }
        }

        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| format!("workspace '{}' has no name", s))?;
        let source = match (claim_name, config, secret, medium) {
            (Some(claim_name), None, None, None) => WorkspaceSource::PersistentVolumeClaim {
                claim_name,
                sub_path,
            },
            (None, Some(config), None, None) => WorkspaceSource::ConfigMap { config, item },
            (None, None, Some(secret), None) => WorkspaceSource::Secret { secret },
            (None, None, None, Some(medium)) => WorkspaceSource::EmptyDir { medium },
            _ => {
                return Err(format!(
                    "workspace {} needs exactly one of claimName, config, secret, emptyDir",
                    name
                ));
            }
        };
        Ok(Self { name, source })
    }
}

/// Everything needed to build a start command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartObject {
    pub name: String,
    pub resources: Vec<StartResource>,
    pub params: Vec<(String, String)>,
    pub workspaces: Vec<StartWorkspace>,
    pub service_account: Option<String>,
}

impl StartObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Command {
    /// `tkn task start <name> [-i in=ref]… [-o out=ref]… [--param k=v]… [-w ws]… [-s sa]`
    ///
    /// Resources without a direction are skipped.
    pub fn start_task(task: &StartObject) -> CliCommand {
        let mut cmd = CliCommand::tkn("task").arg("start").arg(&task.name).verbose();
        for resource in &task.resources {
            let flag = match resource.direction {
                Some(ResourceDirection::Inputs) => "-i",
                Some(ResourceDirection::Outputs) => "-o",
                None => continue,
            };
            cmd = cmd.flag_with_value(
                flag,
                &format!("{}={}", resource.name, resource.resource_ref),
            );
        }
        for (key, value) in &task.params {
            cmd = cmd.flag_with_value("--param", &format!("{}={}", key, value));
        }
        cmd = with_workspaces(cmd, &task.workspaces);
        if let Some(sa) = &task.service_account {
            cmd = cmd.flag_with_value("-s", sa);
        }
        cmd
    }

    /// `tkn pipeline start <name> [--resource r=ref]… [--param k=v]… [-w ws]… -s <sa>`
    pub fn start_pipeline(pipeline: &StartObject) -> CliCommand {
        let mut cmd = CliCommand::tkn("pipeline")
            .arg("start")
            .arg(&pipeline.name)
            .verbose();
        for resource in &pipeline.resources {
            cmd = cmd.flag_with_value(
                "--resource",
                &format!("{}={}", resource.name, resource.resource_ref),
            );
        }
        for (key, value) in &pipeline.params {
            cmd = cmd.flag_with_value("--param", &format!("{}={}", key, value));
        }
        cmd = with_workspaces(cmd, &pipeline.workspaces);
        let sa = pipeline
            .service_account
            .as_deref()
            .unwrap_or(DEFAULT_PIPELINE_SERVICE_ACCOUNT);
        cmd.flag_with_value("-s", sa)
    }
}

fn with_workspaces(cmd: CliCommand, workspaces: &[StartWorkspace]) -> CliCommand {
    workspaces
        .iter()
        .fold(cmd, |cmd, ws| cmd.flag_with_value("-w", &ws.to_string()))
}
