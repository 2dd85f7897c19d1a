//! Integration tests for `tektree tree` and `tektree children`.

#![cfg(unix)]

mod common;

use common::{TestEnv, stdout_json};
use predicates::prelude::*;

#[test]
fn test_tree_lists_categories() {
    let env = TestEnv::new();
    let output = env.tektree().arg("tree").output().unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    let labels: Vec<&str> = json["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels.len(), 11);
    assert_eq!(labels[0], "Pipelines");
    assert_eq!(labels[10], "ClusterTriggerBinding");
}

#[test]
fn test_tree_denied_shows_single_message() {
    let env = TestEnv::denied();
    env.tektree()
        .args(["tree", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "The current user doesn't have the privileges to interact with tekton resources.",
        ))
        .stdout(predicate::str::contains("Pipelines").not());
}

#[test]
fn test_children_dedups_and_sorts_runs() {
    let env = TestEnv::new();
    let output = env
        .tektree()
        .args(["children", "PipelineRuns"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    let children = json["children"].as_array().unwrap();
    let names: Vec<&str> = children
        .iter()
        .map(|n| n["name"].as_str().unwrap())
        .collect();
    // First occurrence of build-b wins, newest first.
    assert_eq!(names, ["build-a", "build-b"]);
    assert_eq!(children[0]["state"], "False");
    assert_eq!(children[1]["state"], "True");
}

#[test]
fn test_children_paginates_with_page_size() {
    let env = TestEnv::new();
    let output = env
        .tektree()
        .args(["--page-size", "1", "children", "PipelineRuns"])
        .output()
        .unwrap();
    let json = stdout_json(&output);
    let children = json["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[1]["kind"], "more");
    assert_eq!(children[1]["description"], "1 from 2");
    assert_eq!(children[1]["tooltip"], "1 more from 2");

    let output = env
        .tektree()
        .args(["--page-size", "1", "children", "PipelineRuns", "--pages", "2"])
        .output()
        .unwrap();
    let json = stdout_json(&output);
    assert_eq!(json["children"].as_array().unwrap().len(), 2);
    assert_eq!(json["children"][1]["name"], "build-b");
}

#[test]
fn test_children_unknown_node_fails() {
    let env = TestEnv::new();
    env.tektree()
        .args(["children", "PipelineRuns", "missing-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found: PipelineRuns/missing-run"));
}

#[test]
fn test_missing_kubectl_becomes_placeholder() {
    let env = TestEnv::new();
    std::fs::remove_file(env.path().join("kubectl")).unwrap();
    env.tektree()
        .args(["-H", "children", "Tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("! kubectl: "));
}
