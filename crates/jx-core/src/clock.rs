// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source abstraction, injected so phase timing and grace-period
//! deadlines are testable without real sleeps.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> SystemTime;

    fn now_unix_ms(&self) -> i64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Real clock backed by [`SystemTime::now`].
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Deterministic clock for tests: starts at the Unix epoch and only
/// advances when told to.
#[derive(Clone)]
pub struct FakeClock {
    millis: Arc<AtomicI64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn at_unix_ms(ms: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(ms)),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.millis.fetch_add(d.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.millis.load(Ordering::SeqCst).max(0) as u64)
    }

    fn now_unix_ms(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
