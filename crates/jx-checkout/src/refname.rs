// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validates a ref/commit name before it reaches a `git checkout`
//! argument list, so a malicious job document can't smuggle a flag
//! (`-x`) or a path-escaping sequence into the command.

use crate::error::CheckoutError;

const FORBIDDEN_SUBSTRINGS: &[&str] = &["..", "~", "^", ":", "\\"];

pub fn validate(name: &str) -> Result<(), CheckoutError> {
    if name.is_empty() || name.starts_with('-') {
        return Err(CheckoutError::InvalidRefName(name.to_string()));
    }
    if name.ends_with('.') {
        return Err(CheckoutError::InvalidRefName(name.to_string()));
    }
    if name.chars().any(|c| c.is_control() || c == ' ') {
        return Err(CheckoutError::InvalidRefName(name.to_string()));
    }
    if FORBIDDEN_SUBSTRINGS.iter().any(|needle| name.contains(needle)) {
        return Err(CheckoutError::InvalidRefName(name.to_string()));
    }
    Ok(())
}
