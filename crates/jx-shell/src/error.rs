// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("executable not found on PATH: {0}")]
    ExecutableNotFound(String),

    #[error("a command is already running through this shell")]
    CommandInProgress,

    #[error("timed out waiting {0:?} for lock on {1}")]
    LockTimeout(std::time::Duration, PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Supervisor(#[from] jx_process::SupervisorError),
}
