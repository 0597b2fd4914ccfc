// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrapper around a single `git` invocation, classifying failures
//! by [`GitOpKind`] so the retry loop can tell a transient clone failure
//! from a checkout that will never succeed no matter how many times it's
//! retried.

use std::path::Path;

use jx_process::subprocess::{run_with_timeout, GIT_COMMAND_TIMEOUT};
use tokio::process::Command;

use crate::error::{CheckoutError, GitOpKind};

pub async fn run_git(cwd: Option<&Path>, args: &[&str], op: GitOpKind) -> Result<(), CheckoutError> {
    let mut cmd = Command::new("git");
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    cmd.args(args);
    let description = format!("git {}", args.join(" "));
    let output = run_with_timeout(cmd, GIT_COMMAND_TIMEOUT, &description)
        .await
        .map_err(|message| CheckoutError::Git { op, message })?;
    if !output.status.success() {
        return Err(CheckoutError::Git {
            op,
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Like [`run_git`] but returns stdout instead of discarding it, for
/// commands whose result is consumed (`git rev-parse`, `git ls-remote`).
pub async fn run_git_capturing(
    cwd: Option<&Path>,
    args: &[&str],
    op: GitOpKind,
) -> Result<String, CheckoutError> {
    let mut cmd = Command::new("git");
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    cmd.args(args);
    let description = format!("git {}", args.join(" "));
    let output = run_with_timeout(cmd, GIT_COMMAND_TIMEOUT, &description)
        .await
        .map_err(|message| CheckoutError::Git { op, message })?;
    if !output.status.success() {
        return Err(CheckoutError::Git {
            op,
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
