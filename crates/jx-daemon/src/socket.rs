// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-domain-socket bind-with-permissions and the path-length guard the
//! Job API Server needs before it ever calls `bind(2)` — `sockaddr_un`'s
//! `sun_path` is a fixed-size buffer on every POSIX platform, so a build
//! path nested deep enough produces a socket path `bind` itself would
//! reject with `ENAMETOOLONG`; catching it early gives a diagnosable
//! `DaemonError` instead of a raw OS error.

use std::path::{Path, PathBuf};

use tokio::net::UnixListener;

use crate::error::DaemonError;

/// Conservative bound below the 108-byte `sun_path` on Linux and the
/// 104-byte one on macOS/BSD, leaving room for the NUL terminator and a
/// platform that's stricter still.
pub const UNIX_SOCKET_PATH_MAX: usize = 100;

pub fn check_path_len(path: &Path) -> Result<(), DaemonError> {
    let len = path.as_os_str().len();
    if len > UNIX_SOCKET_PATH_MAX {
        return Err(DaemonError::SocketPathTooLong { path: path.to_path_buf(), len });
    }
    Ok(())
}

/// Binds a Unix-domain socket at `path`, removing a stale socket file
/// left behind by a previous run, creating parent directories, and
/// restricting permissions to the owner only.
pub async fn bind_unix_socket(path: &Path) -> Result<UnixListener, DaemonError> {
    check_path_len(path)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if path.exists() {
        tokio::fs::remove_file(path).await?;
    }
    let listener = UnixListener::bind(path)?;
    restrict_permissions(path)?;
    Ok(listener)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms).map_err(DaemonError::Io)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
