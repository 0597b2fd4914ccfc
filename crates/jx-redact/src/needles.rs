// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The needle set: an ordered-by-insertion-time set of byte strings.
//!
//! Two entry points populate it: [`NeedleSet::replace_all`] (used by
//! `Reset`, given a whole set from job configuration or test input — not
//! length-filtered, since that's already-validated configuration data)
//! and [`NeedleSet::insert_one`] (used for incremental registration via
//! the Job API's "add redaction string" and the Secrets Pipeline, which
//! enforces the minimum length so a token like `none` never gets
//! redacted).

/// Values shorter than this are rejected with a warning when added
/// one at a time via [`NeedleSet::insert_one`].
pub const MIN_NEEDLE_LEN: usize = 6;

#[derive(Debug, Default, Clone)]
pub struct NeedleSet {
    needles: Vec<Vec<u8>>,
    max_len: usize,
}

impl NeedleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-replace the set, as `Reset(needles)` does. No length filter —
    /// this is assumed to be already-validated configuration or test
    /// input, not user-supplied runtime data.
    pub fn replace_all<I, B>(values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let mut set = Self::new();
        for v in values {
            let needle: Vec<u8> = v.into();
            if needle.is_empty() {
                continue;
            }
            set.max_len = set.max_len.max(needle.len());
            set.needles.push(needle);
        }
        set
    }

    /// Add one needle at runtime, rejecting it (with a warning) if it's
    /// shorter than [`MIN_NEEDLE_LEN`] or already present.
    pub fn insert_one(&mut self, needle: Vec<u8>) -> bool {
        if needle.len() < MIN_NEEDLE_LEN {
            tracing::warn!(
                len = needle.len(),
                min = MIN_NEEDLE_LEN,
                "refusing to redact needle shorter than the minimum length"
            );
            return false;
        }
        if self.needles.iter().any(|n| n == &needle) {
            return false;
        }
        self.max_len = self.max_len.max(needle.len());
        self.needles.push(needle);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.needles.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// The longest needle that matches `buf` starting at byte 0, if any
    /// (tie-break (b): longest match wins).
    pub fn longest_match_at_start(&self, buf: &[u8]) -> Option<usize> {
        self.needles
            .iter()
            .filter(|n| buf.len() >= n.len() && &buf[..n.len()] == n.as_slice())
            .map(|n| n.len())
            .max()
    }

    /// Whether `tail` could still grow into a full match with more bytes
    /// — i.e. `tail` is a proper prefix of some needle.
    pub fn is_potential_prefix(&self, tail: &[u8]) -> bool {
        self.needles
            .iter()
            .any(|n| n.len() > tail.len() && n.starts_with(tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_one_rejects_needles_shorter_than_minimum() {
        let mut set = NeedleSet::new();
        assert!(!set.insert_one(b"none".to_vec()));
        assert!(set.is_empty());
    }

    #[test]
    fn insert_one_accepts_needle_at_minimum_length() {
        let mut set = NeedleSet::new();
        assert!(set.insert_one(b"abcdef".to_vec()));
        assert_eq!(set.max_len(), 6);
    }

    #[test]
    fn replace_all_does_not_filter_by_length() {
        let set = NeedleSet::replace_all(["um do".as_bytes().to_vec()]);
        assert!(!set.is_empty());
    }

    #[test]
    fn longest_match_prefers_longer_needle() {
        let set = NeedleSet::replace_all([
            "um do".as_bytes().to_vec(),
            "ipsum dolor".as_bytes().to_vec(),
        ]);
        assert_eq!(set.longest_match_at_start(b"ipsum dolor sit"), Some(11));
    }

    #[test]
    fn potential_prefix_detects_straddling_tail() {
        let set = NeedleSet::replace_all(["secret-token".as_bytes().to_vec()]);
        assert!(set.is_potential_prefix(b"secret-"));
        assert!(!set.is_potential_prefix(b"xsecret-"));
    }
}
