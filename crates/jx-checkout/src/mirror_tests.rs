// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::process::Command;

async fn init_source_repo(dir: &std::path::Path) -> String {
    for args in [
        vec!["init", "-q"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "user.name", "test"],
    ] {
        Command::new("git").args(&args).current_dir(dir).output().await.unwrap();
    }
    std::fs::write(dir.join("README"), "hello\n").unwrap();
    Command::new("git").args(["add", "-A"]).current_dir(dir).output().await.unwrap();
    Command::new("git")
        .args(["commit", "-q", "-m", "initial"])
        .current_dir(dir)
        .output()
        .await
        .unwrap();
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .output()
        .await
        .unwrap();
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[tokio::test]
async fn ensure_mirror_clones_on_first_call() {
    let source = tempfile::tempdir().unwrap();
    init_source_repo(source.path()).await;

    let mirrors = tempfile::tempdir().unwrap();
    let dir = ensure_mirror(mirrors.path(), &source.path().to_string_lossy(), "HEAD")
        .await
        .unwrap();
    assert!(dir.join("HEAD").is_file());
}

#[tokio::test]
async fn ensure_mirror_is_idempotent_for_an_already_present_commit() {
    let source = tempfile::tempdir().unwrap();
    let commit = init_source_repo(source.path()).await;

    let mirrors = tempfile::tempdir().unwrap();
    let location = source.path().to_string_lossy().into_owned();
    let first = ensure_mirror(mirrors.path(), &location, &commit).await.unwrap();
    let second = ensure_mirror(mirrors.path(), &location, &commit).await.unwrap();
    assert_eq!(first, second);
}
