// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Shell(#[from] jx_shell::ShellError),
}
