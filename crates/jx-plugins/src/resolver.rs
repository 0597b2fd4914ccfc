// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};
use std::time::Duration;

use jx_core::PluginReference;
use jx_process::subprocess::{run_with_timeout, GIT_COMMAND_TIMEOUT};
use jx_shell::LockFile;
use tokio::process::Command;

use crate::error::PluginError;
use crate::identity::stable_id;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A resolved plugin: its reference, checkout directory, hooks
/// directory, and validated configuration (if the plugin declares a
/// schema and validation is enabled).
#[derive(Debug, Clone)]
pub struct PluginCheckout {
    pub reference: PluginReference,
    pub id: String,
    pub checkout_dir: PathBuf,
    pub hooks_dir: PathBuf,
    pub validated_config: Option<serde_json::Value>,
}

pub struct PluginResolver {
    plugins_path: PathBuf,
    checkout_root: PathBuf,
    validate: bool,
}

impl PluginResolver {
    pub fn new(plugins_path: impl Into<PathBuf>, checkout_root: impl Into<PathBuf>, validate: bool) -> Self {
        Self { plugins_path: plugins_path.into(), checkout_root: checkout_root.into(), validate }
    }

    pub async fn resolve_all(&self, references: &[PluginReference]) -> Result<Vec<PluginCheckout>, PluginError> {
        let mut checkouts = Vec::with_capacity(references.len());
        for reference in references {
            checkouts.push(self.resolve_one(reference).await?);
        }
        Ok(checkouts)
    }

    async fn resolve_one(&self, reference: &PluginReference) -> Result<PluginCheckout, PluginError> {
        let id = stable_id(reference);

        let checkout_dir = if is_vendored(&reference.location) {
            self.resolve_vendored(&reference.location)?
        } else {
            self.clone_or_update(reference, &id).await?
        };

        let hooks_dir = checkout_dir.join("hooks");
        let validated_config = if self.validate {
            self.validate_configuration(&id, reference, &checkout_dir)?
        } else {
            None
        };

        Ok(PluginCheckout { reference: reference.clone(), id, checkout_dir, hooks_dir, validated_config })
    }

    async fn clone_or_update(&self, reference: &PluginReference, id: &str) -> Result<PathBuf, PluginError> {
        std::fs::create_dir_all(&self.plugins_path)?;
        let lock_path = self.plugins_path.join(format!("{id}.lock"));
        let _lock = LockFile::acquire(&lock_path, LOCK_TIMEOUT)
            .await
            .map_err(|_| PluginError::LockTimeout(id.to_string()))?;

        let checkout_dir = self.plugins_path.join(id);
        if !checkout_dir.join(".git").is_dir() {
            let mut cmd = Command::new("git");
            cmd.args(["clone", &reference.location, &checkout_dir.to_string_lossy()]);
            let output = run_with_timeout(cmd, GIT_COMMAND_TIMEOUT, "plugin clone")
                .await
                .map_err(|message| PluginError::CloneFailed { location: reference.location.clone(), message })?;
            if !output.status.success() {
                return Err(PluginError::CloneFailed {
                    location: reference.location.clone(),
                    message: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }
        }

        if let Some(version) = &reference.version {
            let mut cmd = Command::new("git");
            cmd.args(["-C", &checkout_dir.to_string_lossy(), "checkout", "-f", version]);
            let output = run_with_timeout(cmd, GIT_COMMAND_TIMEOUT, "plugin checkout")
                .await
                .map_err(|message| PluginError::CheckoutFailed {
                    location: reference.location.clone(),
                    version: version.clone(),
                    message,
                })?;
            if !output.status.success() {
                return Err(PluginError::CheckoutFailed {
                    location: reference.location.clone(),
                    version: version.clone(),
                    message: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }
        }

        Ok(checkout_dir)
    }

    fn resolve_vendored(&self, location: &str) -> Result<PathBuf, PluginError> {
        let candidate = self.checkout_root.join(location.trim_start_matches("./"));
        let normalized_root = normalize(&self.checkout_root);
        let normalized_candidate = normalize(&candidate);
        if !normalized_candidate.starts_with(&normalized_root) {
            return Err(PluginError::VendoredPathEscapesCheckout(candidate));
        }
        Ok(candidate)
    }

    fn validate_configuration(
        &self,
        id: &str,
        reference: &PluginReference,
        checkout_dir: &Path,
    ) -> Result<Option<serde_json::Value>, PluginError> {
        let definition_path = checkout_dir.join("plugin.json");
        let Ok(definition_raw) = std::fs::read_to_string(&definition_path) else {
            return Ok(None);
        };
        let definition: serde_json::Value = serde_json::from_str(&definition_raw)?;
        let required: Vec<&str> = definition
            .get("configuration")
            .and_then(|c| c.get("required"))
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let supplied = serde_json::to_value(&reference.configuration)?;
        for key in &required {
            if reference.configuration.get(*key).is_none() {
                return Err(PluginError::ValidationFailed { plugin: id.to_string(), offending: supplied });
            }
        }
        Ok(Some(supplied))
    }
}

/// Vendored plugins are referenced relative to the checkout root, e.g.
/// `./.buildkite/plugins/my-plugin` — everything else (a bare host, a
/// `scheme://`, an `ssh`-style `user@host:` remote, or an absolute
/// filesystem path used as a git remote in tests) is cloned.
/// Resolves `.`/`..` components lexically, without touching the
/// filesystem — containment must hold whether or not the target exists
/// yet (a plugin directory may not be cloned/created at check time).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

fn is_vendored(location: &str) -> bool {
    location.starts_with("./")
}

#[cfg(test)]
mod tests {
    use super::is_vendored;

    #[test]
    fn relative_paths_are_vendored() {
        assert!(is_vendored("./plugins/local-plugin"));
    }

    #[test]
    fn git_urls_are_not_vendored() {
        assert!(!is_vendored("https://github.com/org/plugin.git"));
        assert!(!is_vendored("git@github.com:org/plugin.git"));
        assert!(!is_vendored("github.com/org/plugin"));
    }
}
