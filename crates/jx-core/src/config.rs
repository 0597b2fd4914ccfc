// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job configuration record: an immutable description of one CI job,
//! deserialized from the document the controller hands the agent.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::define_id;

define_id! {
    /// Identifies one job for the lifetime of the agent process.
    pub struct JobId;
}

/// One of the four phases the Phase Engine can be asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Plugin,
    Checkout,
    Command,
    Artifact,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Plugin => "plugin",
            Phase::Checkout => "checkout",
            Phase::Command => "command",
            Phase::Artifact => "artifact",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for a single signature failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignaturePolicy {
    Block,
    Warn,
}

/// The pair of independently configurable signature policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPolicy {
    pub missing_signature: SignaturePolicy,
    pub invalid_signature: SignaturePolicy,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            missing_signature: SignaturePolicy::Warn,
            invalid_signature: SignaturePolicy::Block,
        }
    }
}

/// A reference to one plugin, as it appears in a job's plugin list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginReference {
    /// Git URL or vendored checkout-relative path.
    pub location: String,
    /// Pinned ref (tag/branch/sha), if any.
    pub version: Option<String>,
    /// Plugin configuration as given by the job document.
    #[serde(default)]
    pub configuration: BTreeMap<String, serde_json::Value>,
}

/// A single named secret to fetch and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRequest {
    pub key: String,
    pub env_var: String,
}

/// Git clone/fetch/clean/checkout behavior flags (`BUILDKITE_GIT_*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitOptions {
    pub clone_flags: Vec<String>,
    pub clean_flags: Vec<String>,
    pub fetch_flags: Vec<String>,
    pub checkout_flags: Vec<String>,
    pub submodules: bool,
    pub ssh_keyscan: bool,
    pub mirrors_path: Option<String>,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            clone_flags: Vec::new(),
            clean_flags: vec!["-fxdq".to_string()],
            fetch_flags: Vec::new(),
            checkout_flags: Vec::new(),
            submodules: false,
            ssh_keyscan: false,
            mirrors_path: None,
        }
    }
}

/// Immutable record describing one job, per the controller's job document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub id: JobId,
    pub command: String,

    pub repository: String,
    pub commit: String,
    pub branch: String,
    pub refspec: Option<String>,
    pub pull_request: Option<String>,
    pub pipeline_provider: String,

    pub agent_name: String,
    pub organization_slug: String,
    pub pipeline_slug: String,

    pub build_path: String,
    pub hooks_path: String,
    pub plugins_path: String,

    #[serde(default)]
    pub git: GitOptions,

    #[serde(default)]
    pub plugins: Vec<PluginReference>,
    #[serde(default)]
    pub secrets: Vec<SecretRequest>,

    /// Glob patterns of env var names whose values must be redacted.
    #[serde(default)]
    pub redacted_vars: Vec<String>,

    /// Glob patterns of files to upload to the controller once the
    /// command phase finishes, evaluated relative to the checkout
    /// directory. Empty means the artifact phase still dispatches its
    /// hook triples but uploads nothing.
    #[serde(default)]
    pub artifact_paths: Vec<String>,

    #[serde(with = "cancel_signal_serde")]
    pub cancel_signal: CancelSignal,
    #[serde(with = "duration_secs")]
    pub grace_period: Duration,

    #[serde(default)]
    pub signing_policy: SigningPolicy,
    /// Trusted key material: a JWK set or KMS key reference, opaque here.
    pub verification_key: Option<String>,
    /// The step's own compact-JWS signature, if the pipeline signed it.
    #[serde(default)]
    pub signature: Option<String>,

    pub tracing_backend: Option<String>,

    pub phases: Vec<Phase>,
}

impl JobConfig {
    pub fn phase_enabled(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

/// The signal used to ask a process group to exit cooperatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelSignal {
    Interrupt,
    Terminate,
    Hangup,
    Quit,
}

impl CancelSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            CancelSignal::Interrupt => "INT",
            CancelSignal::Terminate => "TERM",
            CancelSignal::Hangup => "HUP",
            CancelSignal::Quit => "QUIT",
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        CancelSignal::Terminate
    }
}

mod cancel_signal_serde {
    use super::CancelSignal;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &CancelSignal, s: S) -> Result<S::Ok, S::Error> {
        v.as_str().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<CancelSignal, D::Error> {
        let raw = String::deserialize(d)?;
        match raw.to_uppercase().as_str() {
            "INT" | "SIGINT" => Ok(CancelSignal::Interrupt),
            "TERM" | "SIGTERM" => Ok(CancelSignal::Terminate),
            "HUP" | "SIGHUP" => Ok(CancelSignal::Hangup),
            "QUIT" | "SIGQUIT" => Ok(CancelSignal::Quit),
            other => Err(serde::de::Error::custom(format!(
                "unsupported cancel signal: {other}"
            ))),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(v.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> serde_json::Value {
        serde_json::json!({
            "id": "job-1",
            "command": "echo hi",
            "repository": "https://example.com/repo.git",
            "commit": "HEAD",
            "branch": "main",
            "refspec": null,
            "pull_request": null,
            "pipeline_provider": "github",
            "agent_name": "agent-1",
            "organization_slug": "acme",
            "pipeline_slug": "build",
            "build_path": "/tmp/builds",
            "hooks_path": "/tmp/hooks",
            "plugins_path": "/tmp/plugins",
            "cancel_signal": "SIGTERM",
            "grace_period": 10,
            "verification_key": null,
            "tracing_backend": null,
            "phases": ["checkout", "command"]
        })
    }

    #[test]
    fn deserializes_minimal_config_with_defaults() {
        let cfg: JobConfig = serde_json::from_value(minimal_json()).unwrap();
        assert_eq!(cfg.id.as_str(), "job-1");
        assert_eq!(cfg.cancel_signal, CancelSignal::Terminate);
        assert_eq!(cfg.grace_period, Duration::from_secs(10));
        assert!(cfg.phase_enabled(Phase::Command));
        assert!(!cfg.phase_enabled(Phase::Plugin));
        assert_eq!(cfg.signing_policy, SigningPolicy::default());
        assert_eq!(cfg.git.clean_flags, vec!["-fxdq".to_string()]);
        assert!(cfg.artifact_paths.is_empty());
    }

    #[test]
    fn rejects_unknown_cancel_signal() {
        let mut json = minimal_json();
        json["cancel_signal"] = serde_json::json!("SIGWEIRD");
        let err = serde_json::from_value::<JobConfig>(json).unwrap_err();
        assert!(err.to_string().contains("unsupported cancel signal"));
    }
}
