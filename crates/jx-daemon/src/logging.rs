// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-process logging bootstrap: a daily-rolling file appender behind
//! `tracing-appender`'s non-blocking writer, `EnvFilter`-driven levels.
//! The returned guard must be held for the process lifetime — dropping
//! it stops the background flush worker.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

use crate::error::DaemonError;

#[must_use = "dropping the logging guard stops the background flush worker"]
pub struct LoggingGuard(#[allow(dead_code)] WorkerGuard);

/// Initializes the global `tracing` subscriber with a daily-rolling file
/// appender under `log_dir` and the given default level filter (overridable
/// via `RUST_LOG`). Safe to call once per process; a second call returns
/// an error rather than panicking.
pub fn init(log_dir: &Path, file_prefix: &str, default_level: &str) -> Result<LoggingGuard, DaemonError> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init()
        .map_err(|e| DaemonError::LoggingInit(e.to_string()))?;

    Ok(LoggingGuard(guard))
}
