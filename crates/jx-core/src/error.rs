// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tagged-error taxonomy shared across the executor: a single
//! `JobError` carrying a `kind` discriminant and an optional boxed cause,
//! rather than a proliferation of per-subsystem error enums at the top.

use std::fmt;

/// One of the eight error categories named in the error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Signature,
    Plugin,
    Checkout,
    Hook,
    Command,
    Cancelled,
    Subsystem,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Signature => "signature",
            ErrorKind::Plugin => "plugin",
            ErrorKind::Checkout => "checkout",
            ErrorKind::Hook => "hook",
            ErrorKind::Command => "command",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Subsystem => "subsystem",
        }
    }

    /// Whether this kind short-circuits the remaining phases (everything
    /// except a bare command failure, which is not itself a phase error).
    pub fn is_phase_error(self) -> bool {
        !matches!(self, ErrorKind::Command)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged job error: a `kind`, a human message, and an optional cause.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        kind: ErrorKind,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn signature(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Signature, message)
    }

    pub fn plugin(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Plugin, message)
    }

    pub fn checkout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Checkout, message)
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Hook, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "job was cancelled")
    }

    pub fn subsystem(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Subsystem, message)
    }

    /// Render the boxed "⚠️ ERROR" marker printed before the agent exits
    /// on a fatal condition.
    pub fn render_boxed(&self) -> String {
        let body = self.to_string();
        let width = body.chars().count().max(20) + 4;
        let bar = "─".repeat(width);
        format!(
            "┌{bar}┐\n│ ⚠️ ERROR: {body}\n└{bar}┘",
            bar = bar,
            body = body
        )
    }
}

/// Accumulates phase errors per the propagation rule: only the first
/// non-cancel error is reported as the cause.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    first: Option<JobError>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `err` unless a non-cancellation error was already recorded,
    /// or `err` itself is a cancellation and something else is already
    /// recorded.
    pub fn record(&mut self, err: JobError) {
        match &self.first {
            None => self.first = Some(err),
            Some(existing) if existing.kind == ErrorKind::Cancelled => {
                // A cancellation doesn't deserve priority over a real cause.
                self.first = Some(err);
            }
            Some(_) => {}
        }
    }

    pub fn into_first(self) -> Option<JobError> {
        self.first
    }

    pub fn has_error(&self) -> bool {
        self.first.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_cancel_error_wins() {
        let mut acc = ErrorAccumulator::new();
        acc.record(JobError::cancelled());
        acc.record(JobError::checkout("clone failed"));
        acc.record(JobError::hook("should not replace checkout error"));
        let err = acc.into_first().unwrap();
        assert_eq!(err.kind, ErrorKind::Checkout);
    }

    #[test]
    fn cancellation_recorded_when_nothing_else_present() {
        let mut acc = ErrorAccumulator::new();
        acc.record(JobError::cancelled());
        assert_eq!(acc.into_first().unwrap().kind, ErrorKind::Cancelled);
    }

    #[test]
    fn boxed_marker_contains_warning_glyph() {
        let err = JobError::signature("missing signature");
        assert!(err.render_boxed().contains("⚠️ ERROR"));
    }

    #[test]
    fn command_errors_are_not_phase_errors() {
        assert!(!ErrorKind::Command.is_phase_error());
        assert!(ErrorKind::Hook.is_phase_error());
    }
}
