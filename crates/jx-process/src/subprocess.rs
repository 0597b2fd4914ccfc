// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A timeout-wrapped `Command::output()` helper shared by callers that
//! need a one-shot subprocess result rather than the full streaming
//! supervision in [`crate::supervisor`] — git plumbing in the Checkout
//! Engine and Plugin Resolver, SSH keyscan, and similar short commands.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for a single git subprocess invocation (clone, fetch,
/// checkout, submodule update).
pub const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for `ssh-keyscan`.
pub const KEYSCAN_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for plugin validation subprocesses.
pub const PLUGIN_VALIDATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
