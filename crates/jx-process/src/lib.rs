// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jx-process: the Process Supervisor — launches a child in its own
//! process group (or Windows job object), optionally behind a PTY, and
//! guarantees no descendant outlives the executor.

pub mod error;
pub mod group;
#[cfg(unix)]
pub mod pty;
pub mod subprocess;
pub mod supervisor;

pub use error::SupervisorError;
pub use group::ProcessGroup;
pub use subprocess::run_with_timeout;
pub use supervisor::{ProcessSupervisor, SpawnSpec, WaitStatus};
