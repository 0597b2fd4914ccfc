// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("job api socket path too long ({len} bytes): {path:?}")]
    SocketPathTooLong { path: PathBuf, len: usize },

    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
