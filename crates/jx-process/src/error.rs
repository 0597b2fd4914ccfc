// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised by the Process Supervisor.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("process already started")]
    ProcessNotStarted,

    #[error("spawn failed: {0}")]
    Spawn(#[source] io::Error),

    #[error("pty allocation failed: {0}")]
    Pty(#[source] io::Error),

    #[error("wait failed: {0}")]
    Wait(#[source] io::Error),

    #[error("signal delivery failed: {0}")]
    Signal(String),
}
