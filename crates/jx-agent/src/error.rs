// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to read job description: {0}")]
    JobInput(String),
    #[error("invalid job description: {0}")]
    JobParse(#[from] serde_json::Error),
    #[error("logging setup failed: {0}")]
    Logging(#[from] jx_daemon::DaemonError),
}
