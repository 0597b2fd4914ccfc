// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin adapters binding `jx-secrets`'s `EnvSink`/`NeedleSink` traits to
//! the real `Shell`/`Redactor` types, so the Secrets Pipeline stays
//! testable against plain in-memory doubles while the engine wires in
//! the genuine runtime objects here.

use jx_secrets::{EnvSink, NeedleSink};
use jx_shell::Shell;
use tokio::io::AsyncWrite;

pub struct ShellEnvSink<'a, W>(pub &'a Shell<W>);

impl<W: AsyncWrite + Unpin + Clone + Send + Sync + 'static> EnvSink for ShellEnvSink<'_, W> {
    fn set_env(&self, key: &str, value: &str) {
        self.0.set_env(key.to_string(), value.to_string());
    }
}

pub struct RedactorNeedleSink<'a, W>(pub &'a jx_redact::Redactor<W>);

impl<W: AsyncWrite + Unpin + Send> NeedleSink for RedactorNeedleSink<'_, W> {
    fn add_needle(&self, needle: &str) -> bool {
        self.0.add_needle(needle.as_bytes().to_vec())
    }
}
