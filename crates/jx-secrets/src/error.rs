// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// One secret that could not be fetched; never carries a value.
#[derive(Debug, Clone)]
pub struct FailedSecret {
    pub key: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    /// All-or-nothing: at least one requested secret could not be
    /// fetched, so none of the values in this batch were processed.
    #[error("failed to fetch secrets: {0:?}")]
    FetchFailed(Vec<FailedSecret>),

    #[error("no processor claims support for secret {0:?}")]
    Unclaimed(String),
}
