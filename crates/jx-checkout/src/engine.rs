// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level orchestration: keyscan, mirror, working clone, retry, and
//! the post-success metadata report — the single entry point the Phase
//! Engine's checkout phase calls.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use jx_core::CancelToken;

use crate::clone::{clone_or_update, CheckoutRequest};
use crate::error::{CheckoutError, GitOpKind};
use crate::gitops::run_git_capturing;
use crate::{keyscan, mirror};

const MAX_ATTEMPTS: u32 = 3;

/// The narrow capability the Checkout Engine needs from the controller
/// connection: reporting commit/author metadata. Kept as a trait so the
/// engine is testable without a real HTTP client.
#[async_trait::async_trait]
pub trait MetadataSink: Send + Sync {
    async fn set_metadata(&self, key: &str, value: &str) -> Result<(), CheckoutError>;
}

pub struct CheckoutEngine {
    cancel: CancelToken,
    metadata_sent: AtomicBool,
}

impl CheckoutEngine {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel, metadata_sent: AtomicBool::new(false) }
    }

    pub async fn run(&self, req: &CheckoutRequest, metadata: &dyn MetadataSink) -> Result<(), CheckoutError> {
        if req.git.ssh_keyscan {
            if let Some(host) = keyscan::extract_host(&req.repository) {
                keyscan::keyscan_into(host, &keyscan::default_known_hosts()).await?;
            }
        }

        let reference = match &req.git.mirrors_path {
            Some(mirrors_path) => {
                Some(mirror::ensure_mirror(Path::new(mirrors_path), &req.repository, &req.commit).await?)
            }
            None => None,
        };

        self.run_with_retry(req, reference.as_deref()).await?;
        self.send_metadata_once(req, metadata).await?;
        Ok(())
    }

    async fn run_with_retry(&self, req: &CheckoutRequest, reference: Option<&Path>) -> Result<(), CheckoutError> {
        let mut last_err: Option<CheckoutError> = None;
        for attempt in 1..=MAX_ATTEMPTS {
            if self.cancel.is_cancelled() {
                return Err(CheckoutError::Cancelled);
            }
            match clone_or_update(req, reference).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                    tracing::warn!(attempt, error = %err, "checkout attempt failed, retrying from a clean slate");
                    let _ = tokio::fs::remove_dir_all(&req.checkout_dir).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(CheckoutError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            last: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn send_metadata_once(&self, req: &CheckoutRequest, metadata: &dyn MetadataSink) -> Result<(), CheckoutError> {
        if self.metadata_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let commit = run_git_capturing(Some(&req.checkout_dir), &["rev-parse", "HEAD"], GitOpKind::Checkout).await?;
        let author = run_git_capturing(
            Some(&req.checkout_dir),
            &["log", "-1", "--format=%an <%ae>"],
            GitOpKind::Checkout,
        )
        .await?;
        metadata.set_metadata("buildkite:git:commit", &commit).await?;
        metadata.set_metadata("buildkite:git:author", &author).await?;
        Ok(())
    }
}

fn is_retryable(err: &CheckoutError) -> bool {
    matches!(err, CheckoutError::Git { op, .. } if op.is_retryable())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
