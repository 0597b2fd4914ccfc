// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Names of the job-level environment variables produced into every child
//! process, and a helper that assembles the initial set from a
//! [`crate::config::JobConfig`].

use std::collections::BTreeMap;

use crate::config::JobConfig;

pub const JOB_ID: &str = "BUILDKITE_JOB_ID";
pub const BUILD_ID: &str = "BUILDKITE_BUILD_ID";
pub const BUILD_NUMBER: &str = "BUILDKITE_BUILD_NUMBER";
pub const BUILD_CHECKOUT_PATH: &str = "BUILDKITE_BUILD_CHECKOUT_PATH";
pub const REPO: &str = "BUILDKITE_REPO";
pub const COMMIT: &str = "BUILDKITE_COMMIT";
pub const BRANCH: &str = "BUILDKITE_BRANCH";
pub const PULL_REQUEST: &str = "BUILDKITE_PULL_REQUEST";
pub const COMMAND: &str = "BUILDKITE_COMMAND";
pub const COMMAND_EXIT_STATUS: &str = "BUILDKITE_COMMAND_EXIT_STATUS";
pub const LAST_HOOK_EXIT_STATUS: &str = "BUILDKITE_LAST_HOOK_EXIT_STATUS";
pub const AGENT_ACCESS_TOKEN: &str = "BUILDKITE_AGENT_ACCESS_TOKEN";
pub const REDACTED_VARS: &str = "BUILDKITE_REDACTED_VARS";
pub const JOB_API_SOCKET: &str = "BUILDKITE_AGENT_JOB_API_SOCKET";
pub const JOB_API_TOKEN: &str = "BUILDKITE_AGENT_JOB_API_TOKEN";
pub const PIPELINE_PROVIDER: &str = "BUILDKITE_PIPELINE_PROVIDER";
pub const SSH_KEYSCAN: &str = "BUILDKITE_SSH_KEYSCAN";
pub const GIT_MIRRORS_PATH: &str = "BUILDKITE_GIT_MIRRORS_PATH";

/// CLI/job-config-derived keys a hook may read but never override.
/// Resolves the precedence Open Question: these values come from the
/// operator's job configuration, the outermost trust layer, so a hook's
/// attempt to change one is ignored (and logged) rather than merged.
pub fn protected_job_keys() -> &'static [&'static str] {
    &[JOB_ID, BUILD_ID, BUILD_NUMBER, BUILD_CHECKOUT_PATH, REPO, COMMIT, BRANCH, PULL_REQUEST, COMMAND, PIPELINE_PROVIDER]
}

/// Default glob patterns matched against env var *names* for redaction,
/// independent of any job-supplied additions (seed scenario 2: agent
/// token redaction via `*_ACCESS_TOKEN`).
pub fn default_redacted_var_patterns() -> Vec<String> {
    vec![
        "*_ACCESS_TOKEN".to_string(),
        "*_SECRET".to_string(),
        "*_PASSWORD".to_string(),
        "*_TOKEN".to_string(),
        "*_PRIVATE_KEY".to_string(),
    ]
}

/// Build the minimum job-level environment, before any hook or secret
/// processor contributes further variables.
pub fn base_job_env(
    cfg: &JobConfig,
    build_id: &str,
    build_number: &str,
    checkout_path: &str,
    access_token: &str,
) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert(JOB_ID.to_string(), cfg.id.as_str().to_string());
    env.insert(BUILD_ID.to_string(), build_id.to_string());
    env.insert(BUILD_NUMBER.to_string(), build_number.to_string());
    env.insert(BUILD_CHECKOUT_PATH.to_string(), checkout_path.to_string());
    env.insert(REPO.to_string(), cfg.repository.clone());
    env.insert(COMMIT.to_string(), cfg.commit.clone());
    env.insert(BRANCH.to_string(), cfg.branch.clone());
    if let Some(pr) = &cfg.pull_request {
        env.insert(PULL_REQUEST.to_string(), pr.clone());
    }
    env.insert(COMMAND.to_string(), cfg.command.clone());
    env.insert(AGENT_ACCESS_TOKEN.to_string(), access_token.to_string());

    let mut patterns = default_redacted_var_patterns();
    patterns.extend(cfg.redacted_vars.iter().cloned());
    env.insert(REDACTED_VARS.to_string(), patterns.join(","));

    env.insert(PIPELINE_PROVIDER.to_string(), cfg.pipeline_provider.clone());
    env.insert(
        SSH_KEYSCAN.to_string(),
        cfg.git.ssh_keyscan.to_string(),
    );
    if let Some(mirrors) = &cfg.git.mirrors_path {
        env.insert(GIT_MIRRORS_PATH.to_string(), mirrors.clone());
    }
    env
}
