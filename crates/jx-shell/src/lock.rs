// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process advisory file lock, retried at 1-second intervals until
//! acquired or the deadline passes.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::ShellError;

const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// An acquired advisory lock; releases it (and removes nothing — the
/// lock file itself is left in place for the next acquirer) on drop.
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    /// Blocks (asynchronously, retrying every second) until the lock at
    /// `path` is acquired or `timeout` elapses.
    pub async fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self, ShellError> {
        let path = path.into();
        let deadline = Instant::now() + timeout;
        loop {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&path)
                .map_err(ShellError::Io)?;
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file, path }),
                Err(_) if Instant::now() >= deadline => {
                    return Err(ShellError::LockTimeout(timeout, path));
                }
                Err(_) => {
                    tokio::time::sleep(RETRY_INTERVAL.min(deadline.saturating_duration_since(Instant::now())))
                        .await;
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
