// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jx_core::{env_vars, CancelSignal};
use jx_shell::Shell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
struct SharedBuf(Arc<parking_lot::Mutex<Vec<u8>>>);

impl tokio::io::AsyncWrite for SharedBuf {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        self.0.lock().extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }
    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}

fn base_env() -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("PATH".to_string(), std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string()));
    env
}

#[cfg(unix)]
fn write_hook(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[cfg(unix)]
#[tokio::test]
async fn missing_hook_script_is_a_no_op() {
    let shell = Shell::new("/", base_env(), SharedBuf::default(), false, CancelSignal::Interrupt, Duration::from_secs(5));
    let invocation = HookInvocation {
        scope: HookScope::Global,
        name: "pre-command".to_string(),
        script_path: "/does/not/exist".into(),
        extra_env: BTreeMap::new(),
    };
    let result = HookRunner::run(&shell, invocation).await.unwrap();
    assert!(result.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn env_export_from_hook_is_merged_into_shell_env() {
    let dir = tempfile::tempdir().unwrap();
    let hook = write_hook(dir.path(), "env-hook", "export GREETING=hello");
    let shell = Shell::new(dir.path(), base_env(), SharedBuf::default(), false, CancelSignal::Interrupt, Duration::from_secs(5));

    let invocation = HookInvocation {
        scope: HookScope::Local,
        name: "pre-command".to_string(),
        script_path: hook,
        extra_env: BTreeMap::new(),
    };
    let exit = HookRunner::run(&shell, invocation).await.unwrap().unwrap();
    assert!(exit.success());

    let env = shell.env_snapshot();
    assert_eq!(env.get("GREETING"), Some(&"hello".to_string()));
    assert_eq!(env.get(env_vars::LAST_HOOK_EXIT_STATUS), Some(&"0".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn cwd_change_from_hook_is_applied_to_shell() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("subdir");
    std::fs::create_dir(&sub).unwrap();
    let hook = write_hook(dir.path(), "cd-hook", &format!("cd \"{}\"", sub.display()));
    let shell = Shell::new(dir.path(), base_env(), SharedBuf::default(), false, CancelSignal::Interrupt, Duration::from_secs(5));

    let invocation = HookInvocation {
        scope: HookScope::Local,
        name: "pre-checkout".to_string(),
        script_path: hook,
        extra_env: BTreeMap::new(),
    };
    HookRunner::run(&shell, invocation).await.unwrap();
    assert_eq!(shell.cwd(), sub);
}

#[cfg(unix)]
#[tokio::test]
async fn nonzero_hook_exit_is_reported_without_failing_the_call() {
    let dir = tempfile::tempdir().unwrap();
    let hook = write_hook(dir.path(), "failing-hook", "exit 17");
    let shell = Shell::new(dir.path(), base_env(), SharedBuf::default(), false, CancelSignal::Interrupt, Duration::from_secs(5));

    let invocation = HookInvocation {
        scope: HookScope::Global,
        name: "pre-exit".to_string(),
        script_path: hook,
        extra_env: BTreeMap::new(),
    };
    let exit = HookRunner::run(&shell, invocation).await.unwrap().unwrap();
    assert_eq!(exit.code, 17);
    assert!(!exit.success());
}
