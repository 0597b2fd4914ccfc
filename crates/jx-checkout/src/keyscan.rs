// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ssh-keyscan` against a repository's host, appended to the user's
//! `known_hosts` so the working clone's first SSH handshake doesn't
//! block on an interactive host-key prompt.

use std::path::Path;

use jx_process::subprocess::{run_with_timeout, KEYSCAN_TIMEOUT};
use tokio::process::Command;

use crate::error::CheckoutError;

pub fn default_known_hosts() -> std::path::PathBuf {
    let home = std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    home.join(".ssh").join("known_hosts")
}

/// Extracts the host from a `git@host:path`, `ssh://host/path`, or
/// `https://host/path` remote. Returns `None` for a bare local path
/// (no keyscan needed).
pub fn extract_host(repository: &str) -> Option<&str> {
    if let Some(rest) = repository.strip_prefix("git@") {
        return rest.split(':').next();
    }
    for scheme in ["ssh://", "https://", "http://"] {
        if let Some(rest) = repository.strip_prefix(scheme) {
            let rest = rest.split('@').next_back().unwrap_or(rest);
            return rest.split(['/', ':']).next();
        }
    }
    None
}

pub async fn keyscan_into(host: &str, known_hosts: &Path) -> Result<(), CheckoutError> {
    if let Some(parent) = known_hosts.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut cmd = Command::new("ssh-keyscan");
    cmd.arg(host);
    let output = run_with_timeout(cmd, KEYSCAN_TIMEOUT, "ssh-keyscan")
        .await
        .map_err(|message| CheckoutError::Git {
            op: crate::error::GitOpKind::Fetch,
            message,
        })?;
    let mut existing = tokio::fs::read(known_hosts).await.unwrap_or_default();
    if !existing.is_empty() && !existing.ends_with(b"\n") {
        existing.push(b'\n');
    }
    existing.extend_from_slice(&output.stdout);
    tokio::fs::write(known_hosts, existing).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_host_from_ssh_shorthand() {
        assert_eq!(extract_host("git@github.com:acme/repo.git"), Some("github.com"));
    }

    #[test]
    fn extracts_host_from_ssh_url() {
        assert_eq!(extract_host("ssh://git@example.com/acme/repo.git"), Some("example.com"));
    }

    #[test]
    fn extracts_host_from_https_url() {
        assert_eq!(extract_host("https://github.com/acme/repo.git"), Some("github.com"));
    }

    #[test]
    fn local_paths_have_no_host() {
        assert_eq!(extract_host("/var/repos/acme.git"), None);
        assert_eq!(extract_host("./relative/repo.git"), None);
    }
}
