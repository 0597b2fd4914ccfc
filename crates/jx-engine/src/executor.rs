// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Executor: the top-level object assembling the Phase Engine, the
//! Job API Server, and the controller connection for one job run, per
//! `spec.md` §4.12. Owns the job's single cancel signal and fans it out
//! to the Phase Engine, the Job API Server's accept loop, and the host
//! signal listener.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use jx_core::{CancelToken, Clock, JobConfig, JobError, JobId, JobResult, SignalReason};
use jx_daemon::GracefulShutdown;
use tokio::task::JoinHandle;

use crate::controller::{ControllerClient, JobScopedController};
use crate::error::EngineError;
use crate::jobapi::{generate_token, JobApiServer};
use crate::logchunk::{LogChunker, DEFAULT_MAX_CHUNK_BYTES};
use crate::phases::{PhaseEngine, PhaseEngineParams};

/// Everything the executor needs to run exactly one job to completion.
pub struct ExecutorParams<C, CL> {
    pub job: JobConfig,
    pub checkout_dir: PathBuf,
    pub build_id: String,
    pub build_number: String,
    pub job_api_socket_path: PathBuf,
    pub controller: Arc<C>,
    pub clock: CL,
}

/// Runs one job: wires the Phase Engine's writer through a [`LogChunker`]
/// to the controller, starts the Job API Server alongside it, and calls
/// `FinishJob` once the Phase Engine returns.
pub struct Executor<C, CL> {
    job_id: JobId,
    checkout_dir: PathBuf,
    build_id: String,
    build_number: String,
    job: JobConfig,
    job_api_socket_path: PathBuf,
    controller: Arc<C>,
    clock: CL,
    cancel: CancelToken,
}

impl<C, CL> Executor<C, CL>
where
    C: ControllerClient,
    CL: Clock,
{
    pub fn new(params: ExecutorParams<C, CL>) -> Self {
        let ExecutorParams { job, checkout_dir, build_id, build_number, job_api_socket_path, controller, clock } =
            params;
        Self {
            job_id: job.id.clone(),
            checkout_dir,
            build_id,
            build_number,
            job,
            job_api_socket_path,
            controller,
            clock,
            cancel: CancelToken::new(),
        }
    }

    /// A handle the host signal listener (or a test) can use to cancel
    /// this job from outside `run`.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the job to completion: Phase Engine plus Job API Server,
    /// concluding with `FinishJob` against the controller. Never panics
    /// on a phase error — every failure mode resolves to a [`JobResult`].
    pub async fn run(self) -> JobResult {
        let started_at = self.clock.now();
        let scoped = Arc::new(JobScopedController::new(self.controller.clone(), self.job_id.clone()));
        let (writer, log_handle) = LogChunker::spawn(self.controller.clone(), self.job_id.clone(), DEFAULT_MAX_CHUNK_BYTES);

        let engine_params = PhaseEngineParams {
            job: self.job.clone(),
            checkout_dir: self.checkout_dir.clone(),
            build_id: self.build_id.clone(),
            build_number: self.build_number.clone(),
            writer,
            metadata_sink: scoped.clone(),
            secret_source: scoped.clone(),
            artifact_sink: scoped.clone(),
            cancel: self.cancel.clone(),
        };

        let mut engine = match PhaseEngine::new(engine_params) {
            Ok(engine) => engine,
            Err(err) => {
                let result = setup_failure_result(err);
                // No engine was ever constructed, so the writer handed to
                // `LogChunker::spawn` above already dropped with it.
                let _ = log_handle.await;
                self.report(&result, started_at).await;
                return result;
            }
        };

        let (job_api_shutdown, job_api_task) = match self.start_job_api_server(&engine).await {
            Ok((shutdown, task)) => (Some(shutdown), Some(task)),
            Err(err) => {
                // A Job API bind/listen failure is subsystem-internal
                // (§7 item 8): the job still runs, just without the
                // ability for hooks to call back into it.
                tracing::warn!(error = %err, "job api server failed to start; continuing without it");
                (None, None)
            }
        };

        let signal_task = self.spawn_signal_listener();

        let result = engine.run().await;

        signal_task.abort();
        if let Some(shutdown) = job_api_shutdown {
            shutdown.trigger();
        }
        if let Some(task) = job_api_task {
            let _ = task.await;
        }

        // Flush whatever the Redacting Streamer is still holding, then
        // drop every remaining handle onto the LogChunker (the engine's
        // own `redactor`/`shell` fields) before waiting on its
        // background task — otherwise the channel it reads from never
        // closes and the join hangs forever.
        {
            let mut redactor = engine.redactor().clone();
            use tokio::io::AsyncWriteExt;
            if let Err(err) = redactor.shutdown().await {
                tracing::warn!(error = %err, "failed to flush final log output");
            }
        }
        drop(engine);
        let _ = log_handle.await;

        self.report(&result, started_at).await;
        result
    }

    /// Binds the Job API socket, generates its bearer token, publishes
    /// both into the job's environment (§6: the minimum env-var set
    /// includes `BUILDKITE_AGENT_JOB_API_SOCKET`/`…_TOKEN` from the
    /// start), and spawns its accept loop.
    async fn start_job_api_server<W>(
        &self,
        engine: &PhaseEngine<W, JobScopedController<C>, JobScopedController<C>, JobScopedController<C>>,
    ) -> Result<(GracefulShutdown, JoinHandle<()>), EngineError>
    where
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let listener = jx_daemon::bind_unix_socket(&self.job_api_socket_path)
            .await
            .map_err(|e| EngineError::Controller(e.to_string()))?;
        let token = generate_token();
        let shell = engine.shell_handle();
        let redactor = engine.redactor().clone();
        let metadata_sink = Arc::new(JobScopedController::new(self.controller.clone(), self.job_id.clone()));

        shell.set_env(jx_core::env_vars::JOB_API_SOCKET, self.job_api_socket_path.to_string_lossy().to_string());
        shell.set_env(jx_core::env_vars::JOB_API_TOKEN, token.clone());

        let server = JobApiServer::new(shell, redactor, metadata_sink, token);
        let shutdown = GracefulShutdown::new();
        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { server.serve(listener, shutdown).await }
        });
        Ok((shutdown, task))
    }

    /// Listens for a host interrupt: the first signal cancels the job
    /// cooperatively, the second forces an immediate process exit (§5:
    /// "a second signal escalates to terminate").
    fn spawn_signal_listener(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if wait_for_host_signal().await.is_none() {
                return;
            }
            cancel.cancel();
            if wait_for_host_signal().await.is_some() {
                std::process::exit(130);
            }
        })
    }

    /// Logs the job's outcome and reports it to the controller. Assumes
    /// the Phase Engine and every handle it held onto the log writer
    /// have already been dropped and flushed.
    async fn report(&self, result: &JobResult, started_at: std::time::SystemTime) {
        let elapsed = self.clock.now().duration_since(started_at).unwrap_or(Duration::ZERO);
        let elapsed_human = jx_core::format_elapsed_ms(elapsed.as_millis() as u64);
        if let Some(cause) = &result.cause {
            tracing::error!(elapsed = %elapsed_human, "{}", cause.render_boxed());
        } else {
            tracing::info!(elapsed = %elapsed_human, exit_code = result.exit_code, "job finished");
        }

        if let Err(err) = self.controller.finish_job(&self.job_id, result).await {
            tracing::error!(error = %err, "failed to report job completion to controller");
        }
    }
}

/// Waits for a host interrupt/terminate request. `None` means the signal
/// stream itself failed to install (logged once, not retried).
async fn wait_for_host_signal() -> Option<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                return None;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => Some(()),
            _ = term.recv() => Some(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok()
    }
}

/// Maps a Phase Engine construction failure (signature-gate
/// misconfiguration, almost always) into the same shape `finalize` would
/// have produced had the job gotten far enough to run phases.
fn setup_failure_result(err: EngineError) -> JobResult {
    let cause: JobError = err.into();
    let reason = match cause.kind {
        jx_core::ErrorKind::Signature => SignalReason::SignatureRejected,
        jx_core::ErrorKind::Cancelled => SignalReason::Cancel,
        _ => SignalReason::ProcessRunError,
    };
    JobResult::signalled(reason, cause)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FakeControllerClient;
    use jx_core::{CancelSignal, FakeClock, Phase, SigningPolicy};
    use std::time::Duration as StdDuration;

    fn minimal_job(id: &str, phases: Vec<Phase>) -> JobConfig {
        JobConfig {
            id: JobId::new(id),
            command: "echo hi".to_string(),
            repository: "https://example.com/repo.git".to_string(),
            commit: "HEAD".to_string(),
            branch: "main".to_string(),
            refspec: None,
            pull_request: None,
            pipeline_provider: "github".to_string(),
            agent_name: "agent-1".to_string(),
            organization_slug: "acme".to_string(),
            pipeline_slug: "build".to_string(),
            build_path: "/tmp".to_string(),
            hooks_path: "/nonexistent-hooks".to_string(),
            plugins_path: "/nonexistent-plugins".to_string(),
            git: Default::default(),
            plugins: Vec::new(),
            secrets: Vec::new(),
            redacted_vars: Vec::new(),
            artifact_paths: Vec::new(),
            cancel_signal: CancelSignal::Terminate,
            grace_period: StdDuration::from_secs(1),
            signing_policy: SigningPolicy { missing_signature: jx_core::SignaturePolicy::Warn, invalid_signature: jx_core::SignaturePolicy::Block },
            verification_key: None,
            signature: None,
            tracing_backend: None,
            phases,
        }
    }

    #[tokio::test]
    async fn reports_success_to_controller_when_no_phases_are_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(FakeControllerClient::new());
        let executor = Executor::new(ExecutorParams {
            job: minimal_job("job-1", vec![]),
            checkout_dir: dir.path().to_path_buf(),
            build_id: "build-1".to_string(),
            build_number: "1".to_string(),
            job_api_socket_path: dir.path().join("job-api.sock"),
            controller: controller.clone(),
            clock: FakeClock::new(),
        });

        let result = executor.run().await;
        assert!(result.is_success());
        assert_eq!(*controller.finished.lock(), Some((0, None)));
    }

    #[tokio::test]
    async fn cancel_handle_surfaces_as_cancel_signal_reason() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(FakeControllerClient::new());
        let executor = Executor::new(ExecutorParams {
            job: minimal_job("job-2", vec![Phase::Command]),
            checkout_dir: dir.path().to_path_buf(),
            build_id: "build-1".to_string(),
            build_number: "1".to_string(),
            job_api_socket_path: dir.path().join("job-api.sock"),
            controller: controller.clone(),
            clock: FakeClock::new(),
        });
        executor.cancel_handle().cancel();

        let result = executor.run().await;
        assert_eq!(result.signal_reason, Some(SignalReason::Cancel));
    }
}
