//! Common test utilities for tektree integration tests.
//!
//! Provides `TestEnv`: a temporary directory holding fake `kubectl` and `tkn`
//! scripts plus a config path, so tests never touch a real cluster or the
//! user's `~/.config/tektree/`.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// Pipeline-runs with a duplicated name, as a listing can return.
pub const DUPLICATED_RUNS: &str = r#"{"items": [
  {"metadata": {"name": "build-b", "creationTimestamp": "2024-03-01T10:00:00Z"},
   "status": {"conditions": [{"status": "True"}], "completionTime": "2024-03-01T10:02:00Z"}},
  {"metadata": {"name": "build-a", "creationTimestamp": "2024-03-01T11:00:00Z"},
   "status": {"conditions": [{"status": "False"}]}},
  {"metadata": {"name": "build-b", "creationTimestamp": "2024-03-01T12:00:00Z"}}
]}"#;

/// Task definition with one input and one output resource.
pub const BUILD_TASK: &str = r#"{"metadata": {"name": "build"}, "spec": {"resources": {
  "inputs": [{"name": "source", "type": "git"}],
  "outputs": [{"name": "image", "type": "image"}]
}}}"#;

/// A test environment with fake cluster tools.
///
/// The fake `kubectl` answers the health probes, the pipeline-run listing,
/// and `get task build`; every other `get` returns an empty list. Tests can
/// replace either script with [`TestEnv::write_kubectl`] / [`TestEnv::write_tkn`].
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with a healthy fake cluster.
    pub fn new() -> Self {
        let env = Self {
            dir: TempDir::new().unwrap(),
        };
        env.write_kubectl(&format!(
            r#"case "$*" in
  "auth can-i create pipeline.tekton.dev") echo yes ;;
  "get pipeline.tekton.dev") echo "NAME AGE" ;;
  "get pipelinerun -o json") cat <<'EOF'
{DUPLICATED_RUNS}
EOF
  ;;
  "get task build -o json") cat <<'EOF'
{BUILD_TASK}
EOF
  ;;
  *) echo '{{"items": []}}' ;;
esac"#
        ));
        env.write_tkn(
            r#"case "$1" in
  version) echo "Client version: 0.9.0" ;;
  *) echo "tkn $*" ;;
esac"#,
        );
        env
    }

    /// Create an environment whose user may not use Tekton resources.
    pub fn denied() -> Self {
        let env = Self::new();
        env.write_kubectl(
            r#"case "$*" in
  "auth can-i create pipeline.tekton.dev") echo no; exit 1 ;;
  *) echo '{"items": []}' ;;
esac"#,
        );
        env
    }

    fn write_script(&self, name: &str, body: &str) {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn write_kubectl(&self, body: &str) {
        self.write_script("kubectl", body);
    }

    pub fn write_tkn(&self, body: &str) {
        self.write_script("tkn", body);
    }

    pub fn write_config(&self, content: &str) {
        fs::write(self.config_path(), content).unwrap();
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.kdl")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get a Command for the tektree binary wired to the fake tools.
    pub fn tektree(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tektree"));
        cmd.current_dir(self.dir.path());
        cmd.env_remove("TEKTREE_CONFIG");
        cmd.env_remove("TEKTREE_LOG");
        cmd.arg("--config").arg(self.config_path());
        cmd.arg("--kubectl").arg(self.dir.path().join("kubectl"));
        cmd.arg("--tkn").arg(self.dir.path().join("tkn"));
        cmd
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a command's stdout as JSON.
pub fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}
