//! Stamps `tektree version` output with the build time and git commit.

use std::process::Command;

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string()).filter(|h| !h.is_empty())
}

fn main() {
    for path in [".git/HEAD", ".git/index"] {
        println!("cargo:rerun-if-changed={}", path);
    }

    let built = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    println!("cargo:rustc-env=TEKTREE_BUILD_TIMESTAMP={}", built);
    println!(
        "cargo:rustc-env=TEKTREE_GIT_COMMIT={}",
        short_commit().unwrap_or_else(|| "unknown".to_string())
    );
}
