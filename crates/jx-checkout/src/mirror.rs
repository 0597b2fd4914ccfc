// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The git mirror: a bare, long-lived local clone reused as a
//! `--reference` across jobs that share a repository. Guarded by two
//! distinct locks so a clone only ever happens once and updates are
//! serialised against each other and against a concurrent clone.

use std::path::{Path, PathBuf};
use std::time::Duration;

use jx_shell::LockFile;

use crate::error::{CheckoutError, GitOpKind};
use crate::gitops::run_git;

const LOCK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Sanitises a repository URL into a filesystem-safe stem, shared by
/// `mirror_dir` (the mirror's own directory name) and `ensure_mirror`
/// (its lock file names) so neither has to recover the stem from a
/// `Path` that's only guaranteed to round-trip through `mirror_dir`.
fn sanitise(repository: &str) -> String {
    repository
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// Derives `<mirror-path>/<repo-dir>` from a repository URL the way the
/// teacher derives the per-plugin checkout directory from a stable id:
/// here the "id" is simply the sanitised remote, since a mirror must be
/// discoverable by repository alone, not by an opaque hash.
pub fn mirror_dir(mirrors_path: &Path, repository: &str) -> PathBuf {
    mirrors_path.join(format!("{}.git", sanitise(repository)))
}

/// Ensures the mirror exists (cloning it if not) and is current for
/// `commit`, returning its path for use as a `--reference`.
pub async fn ensure_mirror(mirrors_path: &Path, repository: &str, commit: &str) -> Result<PathBuf, CheckoutError> {
    tokio::fs::create_dir_all(mirrors_path).await?;
    let dir = mirror_dir(mirrors_path, repository);
    let stem = sanitise(repository);

    {
        let clone_lock_path = mirrors_path.join(format!("{stem}.clonelock"));
        let _clone_lock = LockFile::acquire(&clone_lock_path, LOCK_TIMEOUT)
            .await
            .map_err(|_| CheckoutError::MirrorLockTimeout("clone"))?;
        if !dir.join("HEAD").is_file() {
            run_git(None, &["clone", "--mirror", repository, &dir.to_string_lossy()], GitOpKind::Clone).await?;
        }
    }

    if commit != "HEAD" && !commit_present(&dir, commit).await {
        let update_lock_path = mirrors_path.join(format!("{stem}.updatelock"));
        let _update_lock = LockFile::acquire(&update_lock_path, LOCK_TIMEOUT)
            .await
            .map_err(|_| CheckoutError::MirrorLockTimeout("update"))?;
        if !commit_present(&dir, commit).await {
            run_git(Some(&dir), &["remote", "update", "--prune"], GitOpKind::Fetch).await?;
        }
    }

    Ok(dir)
}

async fn commit_present(mirror_dir: &Path, commit: &str) -> bool {
    crate::gitops::run_git_capturing(
        Some(mirror_dir),
        &["cat-file", "-e", &format!("{commit}^{{commit}}")],
        GitOpKind::Fetch,
    )
    .await
    .is_ok()
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;
