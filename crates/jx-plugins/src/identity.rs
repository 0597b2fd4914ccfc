// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use jx_core::PluginReference;
use sha2::{Digest, Sha256};

/// Derives a stable identifier for a plugin reference from its location,
/// version, and configuration — the same inputs, in the same order,
/// always hash to the same id, so two agents resolving the same plugin
/// reference race safely on the same lock file and directory.
pub fn stable_id(reference: &PluginReference) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reference.location.as_bytes());
    hasher.update([0u8]);
    hasher.update(reference.version.as_deref().unwrap_or("").as_bytes());
    hasher.update([0u8]);
    for (key, value) in &reference.configuration {
        hasher.update(key.as_bytes());
        hasher.update([b'=']);
        hasher.update(value.to_string().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..12])
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn reference(location: &str, version: Option<&str>) -> PluginReference {
        PluginReference {
            location: location.to_string(),
            version: version.map(str::to_string),
            configuration: BTreeMap::new(),
        }
    }

    #[test]
    fn same_inputs_hash_identically() {
        let a = stable_id(&reference("github.com/org/plugin", Some("v1.0.0")));
        let b = stable_id(&reference("github.com/org/plugin", Some("v1.0.0")));
        assert_eq!(a, b);
    }

    #[test]
    fn different_versions_hash_differently() {
        let a = stable_id(&reference("github.com/org/plugin", Some("v1.0.0")));
        let b = stable_id(&reference("github.com/org/plugin", Some("v2.0.0")));
        assert_ne!(a, b);
    }

    #[test]
    fn configuration_affects_the_id() {
        let mut with_config = reference("github.com/org/plugin", None);
        with_config.configuration.insert("key".to_string(), serde_json::json!("value"));
        let bare = reference("github.com/org/plugin", None);
        assert_ne!(stable_id(&with_config), stable_id(&bare));
    }
}
