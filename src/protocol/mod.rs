//! Command protocol for the `tkn` and `kubectl` tool families.
//!
//! This module builds argument vectors for named operations. It does not
//! execute anything; see [`crate::executor`] for that.

pub mod start;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The external tool a command is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFamily {
    Tkn,
    Kubectl,
}

impl ToolFamily {
    /// Binary name looked up on `PATH` when no explicit location is configured.
    pub fn binary_name(&self) -> &'static str {
        match self {
            ToolFamily::Tkn => "tkn",
            ToolFamily::Kubectl => "kubectl",
        }
    }
}

impl fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// A command addressed to one tool family: the tool plus its ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CliCommand {
    tool: ToolFamily,
    args: Vec<String>,
    /// Accepts `-v <level>`; see [`CliCommand::with_verbosity`].
    verbose: bool,
}

impl CliCommand {
    fn new(tool: ToolFamily, command: &str) -> Self {
        Self {
            tool,
            args: vec![command.to_string()],
            verbose: false,
        }
    }

    fn tkn(command: &str) -> Self {
        Self::new(ToolFamily::Tkn, command)
    }

    fn kubectl(command: &str) -> Self {
        Self::new(ToolFamily::Kubectl, command)
    }

    /// Mark the command as taking the configured verbosity level.
    pub(crate) fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Add an argument to the command.
    pub(crate) fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Add a flag with a value to the command.
    pub(crate) fn flag_with_value(mut self, flag: &str, value: &str) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        self
    }

    /// Append `-v <level>` when the verbosity level is above zero and the
    /// command is one that takes it. Health checks, watches, follow-mode
    /// logs, definition lookups, and the unfiltered run listings never do.
    ///
    /// # Example
    /// ```
    /// use tektree::protocol::Command;
    /// let cmd = Command::list_pipelines().with_verbosity(3);
    /// assert_eq!(cmd.to_shell_string(), "kubectl get pipeline -o json -v 3");
    /// ```
    pub fn with_verbosity(self, level: u32) -> Self {
        if level > 0 && self.verbose {
            self.flag_with_value("-v", &level.to_string())
        } else {
            self
        }
    }

    /// The tool family this command is addressed to.
    pub fn tool(&self) -> ToolFamily {
        self.tool
    }

    /// The ordered argument vector, without the tool name.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Render the command as a single shell line, quoting where needed.
    pub fn to_shell_string(&self) -> String {
        let mut line = self.tool.binary_name().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_quote(arg));
        }
        line
    }
}

impl fmt::Display for CliCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Named constructors for every operation the explorer issues.
pub struct Command;

impl Command {
    /// List all pipelines.
    pub fn list_pipelines() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("pipeline")
            .flag_with_value("-o", "json")
            .verbose()
    }

    /// List every pipeline-run in the namespace.
    pub fn list_pipeline_runs() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("pipelinerun")
            .flag_with_value("-o", "json")
    }

    /// List the runs of one pipeline.
    ///
    /// # Example
    /// ```
    /// use tektree::protocol::Command;
    /// let cmd = Command::list_pipeline_runs_for("build");
    /// assert_eq!(
    ///     cmd.to_shell_string(),
    ///     "kubectl get pipelinerun -l tekton.dev/pipeline=build -o json"
    /// );
    /// ```
    pub fn list_pipeline_runs_for(pipeline: &str) -> CliCommand {
        CliCommand::kubectl("get")
            .arg("pipelinerun")
            .flag_with_value("-l", &format!("tekton.dev/pipeline={}", pipeline))
            .flag_with_value("-o", "json")
            .verbose()
    }

    pub fn list_tasks() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("task")
            .flag_with_value("-o", "json")
            .verbose()
    }

    pub fn list_cluster_tasks() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("clustertask")
            .flag_with_value("-o", "json")
            .verbose()
    }

    /// List every task-run in the namespace.
    pub fn list_task_runs() -> CliCommand {
        CliCommand::kubectl("get").arg("taskrun").flag_with_value("-o", "json")
    }

    /// List the runs of one task or cluster task.
    pub fn list_task_runs_for_task(task: &str) -> CliCommand {
        CliCommand::kubectl("get")
            .arg("taskrun")
            .flag_with_value("-l", &format!("tekton.dev/task={}", task))
            .flag_with_value("-o", "json")
            .verbose()
    }

    /// List the task-runs spawned by one pipeline-run.
    pub fn list_task_runs_for_pipeline_run(pipeline_run: &str) -> CliCommand {
        CliCommand::kubectl("get")
            .arg("taskrun")
            .flag_with_value("-l", &format!("tekton.dev/pipelineRun={}", pipeline_run))
            .flag_with_value("-o", "json")
    }

    pub fn list_pipeline_resources() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("pipelineresources")
            .flag_with_value("-o", "json")
            .verbose()
    }

    pub fn list_trigger_templates() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("triggertemplates")
            .flag_with_value("-o", "json")
            .verbose()
    }

    pub fn list_trigger_bindings() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("triggerbinding")
            .flag_with_value("-o", "json")
            .verbose()
    }

    pub fn list_cluster_trigger_bindings() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("clustertriggerbinding")
            .flag_with_value("-o", "json")
    }

    pub fn list_event_listeners() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("eventlistener")
            .flag_with_value("-o", "json")
            .verbose()
    }

    pub fn list_conditions() -> CliCommand {
        CliCommand::kubectl("get")
            .arg("conditions")
            .flag_with_value("-o", "json")
    }

    /// Long-lived watch on a single resource.
    ///
    /// # Example
    /// ```
    /// use tektree::protocol::Command;
    /// let cmd = Command::watch_resource("pipelinerun", "build-run-x7k2");
    /// assert_eq!(
    ///     cmd.to_shell_string(),
    ///     "kubectl get pipelinerun build-run-x7k2 -w -o json"
    /// );
    /// ```
    pub fn watch_resource(resource: &str, name: &str) -> CliCommand {
        CliCommand::kubectl("get")
            .arg(resource)
            .arg(name)
            .arg("-w")
            .flag_with_value("-o", "json")
    }

    /// Cluster reachability and authorization probes, run in order.
    pub fn check_tekton() -> Vec<CliCommand> {
        vec![
            CliCommand::kubectl("auth")
                .arg("can-i")
                .arg("create")
                .arg("pipeline.tekton.dev"),
            CliCommand::kubectl("get").arg("pipeline.tekton.dev"),
        ]
    }

    pub fn print_tkn_version() -> CliCommand {
        CliCommand::tkn("version").verbose()
    }

    /// Fetch a task definition (or a cluster task when `cluster` is set).
    pub fn get_task(name: &str, cluster: bool) -> CliCommand {
        let kind = if cluster { "clustertask" } else { "task" };
        CliCommand::kubectl("get")
            .arg(kind)
            .arg(name)
            .flag_with_value("-o", "json")
    }

    pub fn get_pipeline(name: &str) -> CliCommand {
        CliCommand::kubectl("get")
            .arg("pipeline")
            .arg(name)
            .flag_with_value("-o", "json")
    }

    pub fn show_pipeline_run_logs(name: &str, follow: bool) -> CliCommand {
        logs(CliCommand::tkn("pipelinerun"), name, follow)
    }

    pub fn show_task_run_logs(name: &str, follow: bool) -> CliCommand {
        logs(CliCommand::tkn("taskrun"), name, follow)
    }
}

fn logs(cmd: CliCommand, name: &str, follow: bool) -> CliCommand {
    let cmd = cmd.arg("logs").arg(name);
    if follow { cmd.arg("-f") } else { cmd.verbose() }
}
