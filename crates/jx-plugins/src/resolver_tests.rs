// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jx_core::PluginReference;
use std::collections::BTreeMap;
use tokio::process::Command;

fn reference(location: &str, version: Option<&str>) -> PluginReference {
    PluginReference {
        location: location.to_string(),
        version: version.map(str::to_string),
        configuration: BTreeMap::new(),
    }
}

async fn init_git_repo(dir: &std::path::Path) {
    for args in [
        vec!["init", "-q"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "user.name", "test"],
    ] {
        Command::new("git").args(&args).current_dir(dir).output().await.unwrap();
    }
    std::fs::write(dir.join("plugin.json"), r#"{"configuration":{"required":["image"]}}"#).unwrap();
    std::fs::create_dir_all(dir.join("hooks")).unwrap();
    std::fs::write(dir.join("hooks/command"), "#!/bin/sh\necho hi\n").unwrap();
    Command::new("git").args(["add", "-A"]).current_dir(dir).output().await.unwrap();
    Command::new("git")
        .args(["commit", "-q", "-m", "initial"])
        .current_dir(dir)
        .output()
        .await
        .unwrap();
}

#[tokio::test]
async fn clones_a_plugin_into_the_plugins_path() {
    let source = tempfile::tempdir().unwrap();
    init_git_repo(source.path()).await;

    let plugins_path = tempfile::tempdir().unwrap();
    let checkout_root = tempfile::tempdir().unwrap();
    let resolver = PluginResolver::new(plugins_path.path(), checkout_root.path(), true);

    let reference = reference(&source.path().to_string_lossy(), None);
    let checkouts = resolver.resolve_all(&[reference]).await.unwrap();

    assert_eq!(checkouts.len(), 1);
    assert!(checkouts[0].checkout_dir.join(".git").is_dir());
    assert!(checkouts[0].hooks_dir.join("command").is_file());
}

#[tokio::test]
async fn validation_failure_reports_the_offending_configuration() {
    let source = tempfile::tempdir().unwrap();
    init_git_repo(source.path()).await;

    let plugins_path = tempfile::tempdir().unwrap();
    let checkout_root = tempfile::tempdir().unwrap();
    let resolver = PluginResolver::new(plugins_path.path(), checkout_root.path(), true);

    // Missing the required "image" key.
    let reference = reference(&source.path().to_string_lossy(), None);
    let err = resolver.resolve_all(&[reference]).await.unwrap_err();
    assert!(matches!(err, PluginError::ValidationFailed { .. }));
}

#[tokio::test]
async fn vendored_plugin_outside_checkout_root_is_rejected() {
    let plugins_path = tempfile::tempdir().unwrap();
    let checkout_root = tempfile::tempdir().unwrap();
    let resolver = PluginResolver::new(plugins_path.path(), checkout_root.path(), false);

    let reference = reference("./../escape", None);
    let err = resolver.resolve_all(&[reference]).await.unwrap_err();
    assert!(matches!(err, PluginError::VendoredPathEscapesCheckout(_)));
}

#[tokio::test]
async fn vendored_plugin_inside_checkout_root_resolves_without_cloning() {
    let plugins_path = tempfile::tempdir().unwrap();
    let checkout_root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(checkout_root.path().join(".buildkite/plugins/local/hooks")).unwrap();
    let resolver = PluginResolver::new(plugins_path.path(), checkout_root.path(), false);

    let reference = reference("./.buildkite/plugins/local", None);
    let checkouts = resolver.resolve_all(&[reference]).await.unwrap();
    assert_eq!(checkouts.len(), 1);
    assert!(checkouts[0].checkout_dir.ends_with(".buildkite/plugins/local"));
}
