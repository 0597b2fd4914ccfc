// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual `PATH`/`PATHEXT` resolution — a handful of lines, not worth an
//! extra dependency for.

use std::path::{Path, PathBuf};

use crate::error::ShellError;

/// Resolves `name` to an absolute, executable path by walking `path_var`
/// (a `PATH`-style `:`/`;`-separated list) the way a shell would, trying
/// each `PATHEXT` suffix on Windows.
pub fn resolve(name: &str, cwd: &Path, path_var: &str) -> Result<PathBuf, ShellError> {
    let candidate = Path::new(name);
    if candidate.is_absolute() || name.contains(std::path::MAIN_SEPARATOR) {
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            cwd.join(candidate)
        };
        return find_executable_variant(&absolute).ok_or_else(|| ShellError::ExecutableNotFound(name.to_string()));
    }

    for dir in std::env::split_paths(path_var) {
        let joined = dir.join(name);
        if let Some(found) = find_executable_variant(&joined) {
            return Ok(found);
        }
    }
    Err(ShellError::ExecutableNotFound(name.to_string()))
}

#[cfg(windows)]
fn find_executable_variant(base: &Path) -> Option<PathBuf> {
    if is_executable_file(base) {
        return Some(base.to_path_buf());
    }
    let pathext = std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD;.PS1".to_string());
    for ext in pathext.split(';').filter(|e| !e.is_empty()) {
        let mut candidate = base.as_os_str().to_os_string();
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(not(windows))]
fn find_executable_variant(base: &Path) -> Option<PathBuf> {
    if is_executable_file(base) {
        return Some(base.to_path_buf());
    }
    None
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn resolves_via_path_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("mytool");
        std::fs::write(&bin, "#!/bin/sh\necho hi\n").unwrap();
        let mut perms = std::fs::metadata(&bin).unwrap().permissions();
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(0o755);
        std::fs::set_permissions(&bin, perms).unwrap();

        let resolved = resolve("mytool", Path::new("/"), dir.path().to_str().unwrap()).unwrap();
        assert_eq!(resolved, bin);
    }

    #[test]
    fn missing_executable_is_reported() {
        let err = resolve("definitely-not-a-real-binary", Path::new("/"), "/nonexistent").unwrap_err();
        assert!(matches!(err, ShellError::ExecutableNotFound(_)));
    }
}
