// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Phase Engine: `setUp → [Signature Gate] → plugin? → checkout? →
//! command? → artifact? → tearDown`, per `spec.md` §4.10. Owns the
//! per-job tracing span and translates the worst phase error (if any)
//! plus the command's own exit status into a final [`JobResult`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use jx_checkout::{CheckoutEngine, CheckoutRequest, MetadataSink};
use jx_core::{CancelToken, ErrorAccumulator, ErrorKind, JobConfig, JobError, JobResult, Phase, SignalReason};
use jx_hooks::{HookInvocation, HookRunner};
use jx_plugins::{PluginCheckout, PluginResolver};
use jx_secrets::{SecretSource, SecretsPipeline};
use jx_shell::Shell;
use jx_signing::{GateOutcome, SignatureGate};
use tokio::io::AsyncWrite;
use tracing::Instrument;

use crate::controller::ArtifactSink;
use crate::error::EngineError;
use crate::hookpaths::{local_hooks_dir, HookLocations};
use crate::sinks::{RedactorNeedleSink, ShellEnvSink};

const REDACTION_SUBSTITUTION: &[u8] = b"[REDACTED]";
const HOOK_ENVIRONMENT: &str = "environment";
const HOOK_PRE_EXIT: &str = "pre-exit";

/// Constructor parameters for one job run.
pub struct PhaseEngineParams<W, M, S, A> {
    pub job: JobConfig,
    pub checkout_dir: PathBuf,
    pub build_id: String,
    pub build_number: String,
    pub writer: W,
    pub metadata_sink: Arc<M>,
    pub secret_source: Arc<S>,
    pub artifact_sink: Arc<A>,
    pub cancel: CancelToken,
}

pub struct PhaseEngine<W, M, S, A>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    job: JobConfig,
    checkout_dir: PathBuf,
    local_hooks_path: PathBuf,
    shell: Arc<Shell<jx_redact::Redactor<W>>>,
    redactor: jx_redact::Redactor<W>,
    metadata_sink: Arc<M>,
    secret_source: Arc<S>,
    artifact_sink: Arc<A>,
    signature_gate: SignatureGate,
    checkout_engine: CheckoutEngine,
    plugin_resolver: PluginResolver,
    cancel: CancelToken,
    plugins: Vec<PluginCheckout>,
}

impl<W, M, S, A> PhaseEngine<W, M, S, A>
where
    W: AsyncWrite + Unpin + Send + 'static,
    M: MetadataSink + Send + Sync + 'static,
    S: SecretSource + Send + Sync + 'static,
    A: ArtifactSink,
{
    pub fn new(params: PhaseEngineParams<W, M, S, A>) -> Result<Self, EngineError> {
        let PhaseEngineParams {
            job,
            checkout_dir,
            build_id,
            build_number,
            writer,
            metadata_sink,
            secret_source,
            artifact_sink,
            cancel,
        } = params;

        let redactor = jx_redact::Redactor::new(writer, REDACTION_SUBSTITUTION);
        let access_token = format!("agent-token-{}", job.id.as_str());
        let env = jx_core::env_vars::base_job_env(
            &job,
            &build_id,
            &build_number,
            &checkout_dir.to_string_lossy(),
            &access_token,
        );
        let shell = Arc::new(Shell::new(checkout_dir.clone(), env, redactor.clone(), false, job.cancel_signal, job.grace_period));

        let signature_gate = SignatureGate::new(job.signing_policy, job.verification_key.as_deref())?;
        let checkout_engine = CheckoutEngine::new(cancel.clone());
        let plugin_resolver = PluginResolver::new(job.plugins_path.clone(), checkout_dir.clone(), true);
        let local_hooks_path = local_hooks_dir(&checkout_dir);

        Ok(Self {
            job,
            checkout_dir,
            local_hooks_path,
            shell,
            redactor,
            metadata_sink,
            secret_source,
            artifact_sink,
            signature_gate,
            checkout_engine,
            plugin_resolver,
            cancel,
            plugins: Vec::new(),
        })
    }

    /// A shared handle onto the running job's shell state, for the
    /// Executor to hand to the Job API Server — the same env/cwd state,
    /// not a copy.
    pub fn shell_handle(&self) -> Arc<Shell<jx_redact::Redactor<W>>> {
        self.shell.clone()
    }

    pub fn redactor(&self) -> &jx_redact::Redactor<W> {
        &self.redactor
    }

    fn hook_locations(&self) -> HookLocations<'_> {
        HookLocations {
            global_hooks_path: std::path::Path::new(&self.job.hooks_path),
            local_hooks_path: &self.local_hooks_path,
            plugins: &self.plugins,
        }
    }

    /// Runs the whole state machine to completion. `tearDown` (the
    /// `pre-exit` triple) always runs, even if `setUp` itself failed —
    /// per the always-run-tearDown decision.
    pub async fn run(&mut self) -> JobResult {
        let span = tracing::info_span!("job", job_id = %self.job.id);
        async { self.run_inner().await }.instrument(span).await
    }

    async fn run_inner(&mut self) -> JobResult {
        let mut errors = ErrorAccumulator::new();
        let mut command_exit: Option<i32> = None;

        match self.set_up().await {
            Ok(()) => {
                if let Err(err) = self.check_signature() {
                    errors.record(err);
                }
                if !errors.has_error() {
                    self.run_phases(&mut errors, &mut command_exit).await;
                }
            }
            Err(err) => errors.record(err.into()),
        }

        self.tear_down(&mut errors).await;
        finalize(errors, command_exit)
    }

    async fn run_phases(&mut self, errors: &mut ErrorAccumulator, command_exit: &mut Option<i32>) {
        if self.cancel.is_cancelled() {
            errors.record(JobError::cancelled());
            return;
        }
        if self.job.phase_enabled(Phase::Plugin) {
            if let Err(err) = self.run_plugin_phase().await {
                errors.record(err.into());
                return;
            }
        }
        if self.cancel.is_cancelled() {
            errors.record(JobError::cancelled());
            return;
        }
        if self.job.phase_enabled(Phase::Checkout) {
            if let Err(err) = self.run_checkout_phase().await {
                errors.record(err.into());
                return;
            }
        }
        if self.cancel.is_cancelled() {
            errors.record(JobError::cancelled());
            return;
        }
        if self.job.phase_enabled(Phase::Command) {
            match self.run_command_phase().await {
                Ok(exit) => *command_exit = Some(exit),
                Err(err) => {
                    errors.record(err.into());
                    return;
                }
            }
        }
        if self.job.phase_enabled(Phase::Artifact) {
            if let Err(err) = self.run_artifact_phase().await {
                errors.record(err.into());
            }
        }
    }

    async fn set_up(&mut self) -> Result<(), EngineError> {
        self.plugins.clear();
        self.run_hook_triple_body(HOOK_ENVIRONMENT).await
    }

    fn check_signature(&self) -> Result<(), JobError> {
        let mut fields = BTreeMap::new();
        fields.insert("command".to_string(), self.job.command.clone());
        match self.signature_gate.check(self.job.signature.as_deref(), &fields) {
            Ok(GateOutcome::Approved) => Ok(()),
            Ok(GateOutcome::Warned(reason)) => {
                tracing::warn!(%reason, "signature gate warned, proceeding");
                Ok(())
            }
            Err(err) => Err(EngineError::from(err).into()),
        }
    }

    async fn run_plugin_phase(&mut self) -> Result<(), EngineError> {
        self.run_hook_triple_body("pre-plugin").await?;
        self.plugins = self.plugin_resolver.resolve_all(&self.job.plugins).await?;
        self.run_hook_triple_body("post-plugin").await?;
        Ok(())
    }

    async fn run_checkout_phase(&mut self) -> Result<(), EngineError> {
        self.run_hook_triple_body("pre-checkout").await?;

        let overridden = self.run_named_hook_if_present("checkout").await?;
        if !overridden {
            let request = CheckoutRequest {
                repository: self.job.repository.clone(),
                commit: self.job.commit.clone(),
                branch: self.job.branch.clone(),
                refspec: self.job.refspec.clone(),
                pull_request: self.job.pull_request.clone(),
                pipeline_provider: self.job.pipeline_provider.clone(),
                checkout_dir: self.checkout_dir.clone(),
                git: self.job.git.clone(),
            };
            self.checkout_engine.run(&request, self.metadata_sink.as_ref()).await?;
        }

        self.run_hook_triple_body("post-checkout").await?;
        Ok(())
    }

    async fn run_command_phase(&mut self) -> Result<i32, EngineError> {
        self.run_hook_triple_body("pre-command").await?;

        let env_sink = ShellEnvSink(&self.shell);
        let needle_sink = RedactorNeedleSink(&self.redactor);
        let processor = jx_secrets::EnvVarProcessor::new(&env_sink, &needle_sink);
        let processors: [&dyn jx_secrets::Processor; 1] = [&processor];
        SecretsPipeline::fetch_all(self.job.id.as_str(), &self.job.secrets, self.secret_source.as_ref(), &processors)
            .await?;

        let exit_code = if self.run_named_hook_if_present("command").await? {
            self.shell
                .env_snapshot()
                .get(jx_core::env_vars::LAST_HOOK_EXIT_STATUS)
                .and_then(|v| v.parse::<i32>().ok())
                .unwrap_or(0)
        } else {
            self.run_command_script().await?
        };

        self.shell.set_env(jx_core::env_vars::COMMAND_EXIT_STATUS, exit_code.to_string());
        self.run_hook_triple_body("post-command").await?;
        Ok(exit_code)
    }

    /// Writes the job's command to a script under the checkout directory
    /// and runs it through [`Shell::run_script`], the same interpreter
    /// detection the Hook Runner uses — there being no executable file
    /// to invoke directly, since `job.command` is a raw shell fragment.
    async fn run_command_script(&mut self) -> Result<i32, EngineError> {
        let script_path = self.checkout_dir.join(format!(".jx-command-{}", self.job.id.as_str()));
        tokio::fs::write(&script_path, &self.job.command).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tokio::fs::metadata(&script_path).await?.permissions();
            perms.set_mode(0o755);
            tokio::fs::set_permissions(&script_path, perms).await?;
        }
        let status = self.shell.run_script(&script_path, BTreeMap::new()).await;
        let _ = tokio::fs::remove_file(&script_path).await;
        Ok(status?.code.unwrap_or(-1))
    }

    /// Resolves `job.artifact_paths` (glob patterns, relative to the
    /// checkout directory) against the filesystem and hands the matches
    /// to the controller. The actual HTTP upload is the controller's
    /// concern (external collaborator per `spec.md` §1); this phase's job
    /// is only to decide which files qualify and dispatch the hook
    /// triples around that decision.
    async fn run_artifact_phase(&mut self) -> Result<(), EngineError> {
        self.run_hook_triple_body("pre-artifact").await?;

        let paths = self.resolve_artifact_paths();
        if !paths.is_empty() {
            self.artifact_sink.upload_artifacts(&paths).await?;
        }

        self.run_hook_triple_body("post-artifact").await?;
        Ok(())
    }

    fn resolve_artifact_paths(&self) -> Vec<String> {
        let mut matches = Vec::new();
        for pattern in &self.job.artifact_paths {
            let full_pattern = self.checkout_dir.join(pattern);
            let Some(full_pattern) = full_pattern.to_str() else {
                tracing::warn!(%pattern, "artifact path pattern is not valid UTF-8; skipping");
                continue;
            };
            match glob::glob(full_pattern) {
                Ok(entries) => {
                    for entry in entries {
                        match entry {
                            Ok(path) if path.is_file() => matches.push(path.to_string_lossy().into_owned()),
                            Ok(_) => {}
                            Err(err) => tracing::warn!(%pattern, error = %err, "failed to read artifact path entry"),
                        }
                    }
                }
                Err(err) => tracing::warn!(%pattern, error = %err, "invalid artifact path pattern"),
            }
        }
        matches
    }

    async fn tear_down(&mut self, errors: &mut ErrorAccumulator) {
        if let Err(err) = self.run_hook_triple_body(HOOK_PRE_EXIT).await {
            tracing::warn!(error = %err, "pre-exit hook failed; not overwriting a prior phase error");
            if !errors.has_error() {
                errors.record(err.into());
            }
        }
    }

    /// Runs every scope's copy of the named hook, in global → local →
    /// plugin order.
    async fn run_hook_triple_body(&mut self, name: &str) -> Result<(), EngineError> {
        let invocations = self.hook_locations().invocations(name);
        for invocation in invocations {
            self.run_one_hook(invocation).await?;
        }
        Ok(())
    }

    /// Runs the single named hook across all scopes; returns whether any
    /// scope's script existed (used by checkout/command override
    /// semantics: present ⇒ native body is skipped).
    async fn run_named_hook_if_present(&mut self, name: &str) -> Result<bool, EngineError> {
        let invocations = self.hook_locations().invocations(name);
        let mut ran = false;
        for invocation in invocations {
            if self.run_one_hook(invocation).await? {
                ran = true;
            }
        }
        Ok(ran)
    }

    /// Returns whether the hook script existed and ran (`false` for a
    /// missing-script no-op).
    async fn run_one_hook(&mut self, invocation: HookInvocation) -> Result<bool, EngineError> {
        let scope = format!("{:?}", invocation.scope);
        let name = invocation.name.clone();
        match HookRunner::run(&self.shell, invocation).await? {
            Some(exit) if !exit.success() => Err(EngineError::HookFailed { scope, name, code: exit.code }),
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }
}

fn finalize(errors: ErrorAccumulator, command_exit: Option<i32>) -> JobResult {
    if let Some(cause) = errors.into_first() {
        let reason = match cause.kind {
            ErrorKind::Signature => SignalReason::SignatureRejected,
            ErrorKind::Cancelled => SignalReason::Cancel,
            _ => SignalReason::ProcessRunError,
        };
        return JobResult::signalled(reason, cause);
    }
    match command_exit {
        Some(code) => JobResult::command_exit(code),
        None => JobResult::success(),
    }
}
