// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Before/after environment snapshots, dumped by the wrapper script in
//! dotenv-style `KEY=VALUE` lines, and the structured diff computed
//! between them.

use std::collections::BTreeMap;
use std::path::Path;

/// Parse `KEY=VALUE` lines (one per line, no quoting) as dumped by `env`
/// inside the wrapper script.
pub fn parse_env_dump(content: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in content.lines() {
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].to_string();
            let value = line[eq_pos + 1..].to_string();
            if !key.is_empty() {
                map.insert(key, value);
            }
        }
    }
    map
}

pub fn read_env_dump(path: &Path) -> std::io::Result<BTreeMap<String, String>> {
    Ok(parse_env_dump(&std::fs::read_to_string(path)?))
}

/// The structured diff between a hook's before- and after-environment
/// snapshots, plus its final working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDiff {
    pub added: BTreeMap<String, String>,
    pub changed: BTreeMap<String, String>,
    pub removed: Vec<String>,
    pub final_cwd: String,
}

impl EnvDiff {
    pub fn compute(before: &BTreeMap<String, String>, after: &BTreeMap<String, String>, final_cwd: String) -> Self {
        let mut added = BTreeMap::new();
        let mut changed = BTreeMap::new();
        for (key, value) in after {
            match before.get(key) {
                None => {
                    added.insert(key.clone(), value.clone());
                }
                Some(old) if old != value => {
                    changed.insert(key.clone(), value.clone());
                }
                _ => {}
            }
        }
        let removed = before.keys().filter(|k| !after.contains_key(*k)).cloned().collect();
        Self { added, changed, removed, final_cwd }
    }

    /// Every key the hook set or changed, merged into one map (the form
    /// [`HookRunner`](crate::HookRunner) applies back to the shell's env).
    pub fn merged_updates(&self) -> BTreeMap<String, String> {
        let mut updates = self.added.clone();
        updates.extend(self.changed.clone());
        updates
    }
}
