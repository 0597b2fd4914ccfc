// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the ordered `HookInvocation` list for one hook name: global,
//! then local, then each plugin in configuration order — the ordering
//! the concurrency model requires ("Hooks within a phase execute strictly
//! in the order global → local → plugin").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use jx_hooks::{HookInvocation, HookScope};
use jx_plugins::PluginCheckout;

pub struct HookLocations<'a> {
    pub global_hooks_path: &'a Path,
    pub local_hooks_path: &'a Path,
    pub plugins: &'a [PluginCheckout],
}

impl<'a> HookLocations<'a> {
    /// Builds the triple of invocations for `name`, skipping any scope
    /// whose script does not exist is left to [`jx_hooks::HookRunner`]
    /// (a missing script is a no-op there, not here), so the returned
    /// list always has one entry per plugin plus global and local.
    pub fn invocations(&self, name: &str) -> Vec<HookInvocation> {
        let mut invocations = vec![
            HookInvocation {
                scope: HookScope::Global,
                name: name.to_string(),
                script_path: self.global_hooks_path.join(name),
                extra_env: BTreeMap::new(),
            },
            HookInvocation {
                scope: HookScope::Local,
                name: name.to_string(),
                script_path: self.local_hooks_path.join(name),
                extra_env: BTreeMap::new(),
            },
        ];
        for plugin in self.plugins {
            invocations.push(HookInvocation {
                scope: HookScope::Plugin(plugin.reference.location.clone()),
                name: name.to_string(),
                script_path: plugin.hooks_dir.join(name),
                extra_env: plugin_env(plugin),
            });
        }
        invocations
    }
}

/// Per-plugin env: each configuration key, uppercased and prefixed, per
/// "Hook protocol" (§6): "per-plugin env derived from the plugin
/// configuration (keys uppercased and prefixed)".
fn plugin_env(plugin: &PluginCheckout) -> BTreeMap<String, String> {
    let prefix = env_prefix(&plugin.id);
    let mut env = BTreeMap::new();
    if let Some(config) = &plugin.validated_config {
        if let Some(map) = config.as_object() {
            for (key, value) in map {
                let var_name = format!("{prefix}_{}", key.to_uppercase().replace('-', "_"));
                env.insert(var_name, json_scalar(value));
            }
        }
    }
    env
}

fn env_prefix(id: &str) -> String {
    format!("BUILDKITE_PLUGIN_{}", id.to_uppercase().replace(['-', '.'], "_"))
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The local (in-checkout) hooks directory, `.buildkite/hooks` under the
/// job's checkout path.
pub fn local_hooks_dir(checkout_dir: &Path) -> PathBuf {
    checkout_dir.join(".buildkite").join("hooks")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_order_is_global_then_local_then_plugins() {
        let plugin = PluginCheckout {
            reference: jx_core::PluginReference {
                location: "git@example.com:acme/plugin.git".to_string(),
                version: None,
                configuration: BTreeMap::new(),
            },
            id: "plugin-abc123".to_string(),
            checkout_dir: PathBuf::from("/plugins/plugin-abc123"),
            hooks_dir: PathBuf::from("/plugins/plugin-abc123/hooks"),
            validated_config: None,
        };
        let locations =
            HookLocations { global_hooks_path: Path::new("/hooks"), local_hooks_path: Path::new("/repo/.buildkite/hooks"), plugins: std::slice::from_ref(&plugin) };
        let invocations = locations.invocations("pre-command");
        assert_eq!(invocations.len(), 3);
        assert_eq!(invocations[0].scope, HookScope::Global);
        assert_eq!(invocations[1].scope, HookScope::Local);
        assert!(matches!(&invocations[2].scope, HookScope::Plugin(loc) if loc == "git@example.com:acme/plugin.git"));
    }

    #[test]
    fn plugin_config_becomes_uppercased_prefixed_env() {
        let plugin = PluginCheckout {
            reference: jx_core::PluginReference {
                location: "./local-plugin".to_string(),
                version: None,
                configuration: BTreeMap::new(),
            },
            id: "local-plugin-1".to_string(),
            checkout_dir: PathBuf::from("/checkout/local-plugin"),
            hooks_dir: PathBuf::from("/checkout/local-plugin/hooks"),
            validated_config: Some(serde_json::json!({"docker-compose-file": "docker-compose.yml"})),
        };
        let locations = HookLocations {
            global_hooks_path: Path::new("/hooks"),
            local_hooks_path: Path::new("/repo/.buildkite/hooks"),
            plugins: std::slice::from_ref(&plugin),
        };
        let invocations = locations.invocations("environment");
        let plugin_env = &invocations[2].extra_env;
        assert_eq!(
            plugin_env.get("BUILDKITE_PLUGIN_LOCAL_PLUGIN_1_DOCKER_COMPOSE_FILE"),
            Some(&"docker-compose.yml".to_string())
        );
    }
}
