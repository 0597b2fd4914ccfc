// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-level settings (not job-level — see `jx_core::JobConfig` for
//! that): where the controller lives, how this agent identifies itself,
//! and where it logs. Loaded from an optional TOML file, then
//! overridden by `JX_AGENT_*` environment variables, the way the
//! teacher's `daemon::lifecycle::Config::load()` layers file and
//! environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AgentError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub controller_base_url: String,
    pub access_token: String,
    pub agent_name: String,
    pub tags: Vec<String>,
    pub build_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            controller_base_url: "http://127.0.0.1:8080".to_string(),
            access_token: String::new(),
            agent_name: "jx-agent".to_string(),
            tags: Vec::new(),
            build_path: PathBuf::from("/tmp/jx-agent/builds"),
            log_dir: PathBuf::from("/tmp/jx-agent/logs"),
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Reads `path` (if given) as TOML, falling back to defaults when
    /// absent, then applies `JX_AGENT_*` env overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, AgentError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| AgentError::Config(format!("{}: {e}", path.display())))?;
                toml::from_str(&raw).map_err(|e| AgentError::Config(format!("{}: {e}", path.display())))?
            }
            None => AgentConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("JX_AGENT_CONTROLLER_BASE_URL") {
            self.controller_base_url = v;
        }
        if let Ok(v) = std::env::var("JX_AGENT_ACCESS_TOKEN") {
            self.access_token = v;
        }
        if let Ok(v) = std::env::var("JX_AGENT_NAME") {
            self.agent_name = v;
        }
        if let Ok(v) = std::env::var("JX_AGENT_TAGS") {
            self.tags = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = std::env::var("JX_AGENT_BUILD_PATH") {
            self.build_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("JX_AGENT_LOG_DIR") {
            self.log_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("JX_AGENT_LOG_LEVEL") {
            self.log_level = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_no_file_is_given() {
        let config = AgentConfig::load(None).unwrap();
        assert_eq!(config.agent_name, "jx-agent");
    }

    #[test]
    fn file_values_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "agent_name = \"ci-1\"\ncontroller_base_url = \"http://ctrl:9000\"\n").unwrap();
        let config = AgentConfig::load(Some(&path)).unwrap();
        assert_eq!(config.agent_name, "ci-1");
        assert_eq!(config.controller_base_url, "http://ctrl:9000");
    }
}
