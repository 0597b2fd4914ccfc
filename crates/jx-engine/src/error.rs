// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversions from every subsystem error into the top-level tagged
//! [`jx_core::JobError`] the Phase Engine and Executor report.

use jx_core::{ErrorKind, JobError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Signature(#[from] jx_signing::SignatureError),

    #[error(transparent)]
    Plugin(#[from] jx_plugins::PluginError),

    #[error(transparent)]
    Checkout(#[from] jx_checkout::CheckoutError),

    #[error(transparent)]
    Hook(#[from] jx_hooks::HookError),

    #[error(transparent)]
    Shell(#[from] jx_shell::ShellError),

    #[error(transparent)]
    Secrets(#[from] jx_secrets::SecretsError),

    #[error("controller request failed: {0}")]
    Controller(String),

    #[error("hook {scope} {name} exited {code}")]
    HookFailed { scope: String, name: String, code: i32 },

    #[error("job was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Classifies this error into one of the eight `ErrorKind`s, matching
    /// the propagation rule in the error-handling design.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Signature(_) => ErrorKind::Signature,
            EngineError::Plugin(_) => ErrorKind::Plugin,
            EngineError::Checkout(_) => ErrorKind::Checkout,
            EngineError::Hook(_) | EngineError::HookFailed { .. } => ErrorKind::Hook,
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::Shell(_) | EngineError::Secrets(_) | EngineError::Controller(_) | EngineError::Io(_) => {
                ErrorKind::Subsystem
            }
        }
    }
}

impl From<EngineError> for JobError {
    fn from(err: EngineError) -> Self {
        let kind = err.kind();
        JobError::with_cause(kind, err.to_string(), err)
    }
}
