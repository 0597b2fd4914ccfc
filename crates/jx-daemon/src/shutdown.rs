// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Job API Server's shutdown-with-drain primitive: once triggered,
//! callers get up to `grace` to let in-flight work finish before the
//! caller is expected to tear the listener down unconditionally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

#[derive(Clone, Default)]
pub struct GracefulShutdown {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    notify: Notify,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    pub async fn triggered(&self) {
        if self.is_triggered() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

/// Waits for `shutdown` to trigger, then races `work` (e.g. an accept
/// loop's final drain of open connections) against `grace`. Returns
/// `Some` if `work` finished in time, `None` if the grace period elapsed
/// first — either way the caller proceeds to tear the listener down.
pub async fn drain<F>(work: F, shutdown: &GracefulShutdown, grace: Duration) -> Option<F::Output>
where
    F: std::future::Future,
{
    shutdown.triggered().await;
    tokio::select! {
        out = work => Some(out),
        _ = tokio::time::sleep(grace) => None,
    }
}
