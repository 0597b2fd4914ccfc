// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jx-redact: the Redacting Streamer. Wraps a downstream writer and
//! replaces every occurrence of a dynamic needle set with a fixed
//! substitution, across `write` boundaries.

mod needles;
mod redactor;

pub use needles::MIN_NEEDLE_LEN;
pub use redactor::Redactor;

#[cfg(test)]
#[path = "redactor_tests.rs"]
mod tests;
