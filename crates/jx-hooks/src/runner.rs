// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::path::PathBuf;

use jx_core::env_vars;
use jx_shell::Shell;
use tokio::io::AsyncWrite;

use crate::diff::{self, EnvDiff};
use crate::error::HookError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookScope {
    Global,
    Local,
    Plugin(String),
}

/// One hook invocation request.
#[derive(Debug, Clone)]
pub struct HookInvocation {
    pub scope: HookScope,
    pub name: String,
    pub script_path: PathBuf,
    pub extra_env: BTreeMap<String, String>,
}

/// A hook's exit status, distinguishable from a command's so the phase
/// engine can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookExit {
    pub code: i32,
}

impl HookExit {
    pub fn success(self) -> bool {
        self.code == 0
    }
}

pub struct HookRunner;

impl HookRunner {
    /// Runs `invocation` through `shell`. A no-op (`Ok(None)`) if the
    /// named hook script does not exist.
    pub async fn run<W>(shell: &Shell<W>, invocation: HookInvocation) -> Result<Option<HookExit>, HookError>
    where
        W: AsyncWrite + Unpin + Clone + Send + 'static,
    {
        if !invocation.script_path.is_file() {
            tracing::debug!(
                scope = ?invocation.scope,
                name = %invocation.name,
                path = %invocation.script_path.display(),
                "hook script not present, skipping"
            );
            return Ok(None);
        }

        let before_env = shell.env_snapshot();
        let workdir = tempfile::tempdir()?;
        let after_env_path = workdir.path().join("after.env");
        let after_cwd_path = workdir.path().join("after.cwd");
        let wrapper_ext = if cfg!(windows) { "ps1" } else { "sh" };
        let wrapper_path = workdir.path().join(format!("wrapper.{wrapper_ext}"));

        write_wrapper_script(&wrapper_path, &invocation.script_path, &after_env_path, &after_cwd_path)?;

        let status = shell.run_script(&wrapper_path, invocation.extra_env).await?;
        let exit = HookExit { code: status.code.unwrap_or(-1) };

        let after_env = diff::read_env_dump(&after_env_path).unwrap_or_default();
        let final_cwd = std::fs::read_to_string(&after_cwd_path).unwrap_or_default().trim().to_string();
        let diff = EnvDiff::compute(&before_env, &after_env, final_cwd);

        apply_diff(shell, &diff);
        shell.set_env(env_vars::LAST_HOOK_EXIT_STATUS, exit.code.to_string());

        Ok(Some(exit))
    }
}

fn apply_diff<W: AsyncWrite + Unpin + Clone + Send + 'static>(shell: &Shell<W>, diff: &EnvDiff) {
    if !diff.final_cwd.is_empty() && diff.final_cwd != shell.cwd().to_string_lossy() {
        if let Err(err) = shell.chdir(&diff.final_cwd) {
            tracing::warn!(error = %err, cwd = %diff.final_cwd, "hook reported a cwd the shell could not chdir into");
        }
    }

    let protected = env_vars::protected_job_keys();
    let mut updates = diff.merged_updates();
    updates.retain(|key, _| {
        let is_protected = protected.contains(&key.as_str());
        if is_protected {
            tracing::warn!(%key, "hook attempted to override a job-config env var; ignoring");
        }
        !is_protected
    });
    shell.merge_env(updates);

    for key in &diff.removed {
        // `Shell` only exposes additive merges; a removed key is modelled
        // as an empty value rather than as an env_remove, matching how
        // the wrapper script itself can't distinguish "unset" from
        // "never existed" once dumped through `env`.
        if key == env_vars::LAST_HOOK_EXIT_STATUS || protected.contains(&key.as_str()) {
            continue;
        }
        shell.set_env(key, "");
    }
}

#[cfg(unix)]
fn write_wrapper_script(
    wrapper_path: &std::path::Path,
    hook_path: &std::path::Path,
    after_env_path: &std::path::Path,
    after_cwd_path: &std::path::Path,
) -> std::io::Result<()> {
    let script = format!(
        "#!/bin/sh\n\"{hook}\"\nhook_exit=$?\npwd > \"{cwd}\"\nenv > \"{env}\"\nexit $hook_exit\n",
        hook = hook_path.display(),
        cwd = after_cwd_path.display(),
        env = after_env_path.display(),
    );
    std::fs::write(wrapper_path, script)?;
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(wrapper_path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(wrapper_path, perms)
}

#[cfg(windows)]
fn write_wrapper_script(
    wrapper_path: &std::path::Path,
    hook_path: &std::path::Path,
    after_env_path: &std::path::Path,
    after_cwd_path: &std::path::Path,
) -> std::io::Result<()> {
    let script = format!(
        "& \"{hook}\"\n$hook_exit = $LASTEXITCODE\n(Get-Location).Path | Out-File -Encoding ascii \"{cwd}\"\nGet-ChildItem Env: | ForEach-Object {{ \"$($_.Name)=$($_.Value)\" }} | Out-File -Encoding ascii \"{env}\"\nexit $hook_exit\n",
        hook = hook_path.display(),
        cwd = after_cwd_path.display(),
        env = after_env_path.display(),
    );
    std::fs::write(wrapper_path, script)
}
