// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// The git-operation class a failure is classified under, per the
/// retryable/fatal split in the error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOpKind {
    Clone,
    Clean,
    CleanSubmodule,
    Fetch,
    Checkout,
}

impl GitOpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GitOpKind::Clone => "clone",
            GitOpKind::Clean => "clean",
            GitOpKind::CleanSubmodule => "clean-submodule",
            GitOpKind::Fetch => "fetch",
            GitOpKind::Checkout => "checkout",
        }
    }

    /// Clone and clean failures are transient enough to warrant a
    /// clean-slate retry; fetch/checkout failures usually mean the
    /// requested ref doesn't exist and retrying won't help.
    pub fn is_retryable(self) -> bool {
        matches!(self, GitOpKind::Clone | GitOpKind::Clean | GitOpKind::CleanSubmodule)
    }
}

impl std::fmt::Display for GitOpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("git {op} failed: {message}")]
    Git { op: GitOpKind, message: String },

    #[error("rejected ref name {0:?}")]
    InvalidRefName(String),

    #[error("timed out acquiring {0} lock for the git mirror")]
    MirrorLockTimeout(&'static str),

    #[error("checkout retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("cancelled")]
    Cancelled,

    #[error("failed to report checkout metadata: {0}")]
    Metadata(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Shell(#[from] jx_shell::ShellError),
}
