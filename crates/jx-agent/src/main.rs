// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jx-agent: the CLI entry point. Loads agent-level configuration, reads
//! one job description, and runs it to completion through
//! `jx_engine::Executor`, exiting with the job's own status.

mod config;
mod error;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use jx_core::{JobConfig, JobResult, SystemClock};
use jx_engine::{Executor, ExecutorParams, FakeControllerClient, HttpControllerClient};

use crate::config::AgentConfig;
use crate::error::AgentError;

#[derive(Parser)]
#[command(name = "jx-agent", version, about = "Runs one CI job to completion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a job description read from a file (or stdin, with `-`
    /// or no path given) and exit with its status.
    Run(RunArgs),
    /// Print version information.
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Path to the job description JSON document. Reads stdin if omitted.
    job: Option<PathBuf>,
    /// Path to the agent's own TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Build number to report alongside the job (controller-assigned in
    /// production; a CLI-supplied value is this bootstrap form's stand-in).
    #[arg(long, default_value = "1")]
    build_number: String,
    /// Use an in-memory controller instead of dialing `controller_base_url`.
    /// Used by the black-box test suite; never set in production.
    #[arg(long, hide = true)]
    fake_controller: bool,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("jx-agent {}", env!("CARGO_PKG_VERSION"));
        }
        Command::Run(args) => {
            let exit_code = run(args);
            std::process::exit(exit_code);
        }
    }
}

fn run(args: RunArgs) -> i32 {
    let agent_config = match AgentConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    let _log_guard = match jx_daemon::init_logging(&agent_config.log_dir, "jx-agent", &agent_config.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {}", AgentError::from(err));
            return 1;
        }
    };

    let job = match read_job_config(args.job.as_deref()) {
        Ok(job) => job,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            return 1;
        }
    };

    let result = runtime.block_on(run_job(job, &agent_config, &args));
    report_and_exit_code(&result)
}

async fn run_job(job: JobConfig, agent_config: &AgentConfig, args: &RunArgs) -> JobResult {
    let checkout_dir = agent_config.build_path.join(job.id.as_str());
    if let Err(err) = tokio::fs::create_dir_all(&checkout_dir).await {
        return JobResult::signalled(
            jx_core::SignalReason::ProcessRunError,
            jx_core::JobError::subsystem(format!("failed to create checkout directory: {err}")),
        );
    }
    let job_api_socket_path = checkout_dir.join("job-api.sock");
    let build_id = format!("build-{}", job.id.as_str());

    if args.fake_controller {
        let controller = Arc::new(FakeControllerClient::new());
        let result = Executor::new(ExecutorParams {
            job,
            checkout_dir,
            build_id,
            build_number: args.build_number.clone(),
            job_api_socket_path,
            controller: controller.clone(),
            clock: SystemClock,
        })
        .run()
        .await;
        if let Some((exit_code, reason)) = controller.finished.lock().clone() {
            let report = serde_json::json!({
                "exit_code": exit_code,
                "signal_reason": reason,
                "artifacts": controller.artifacts.lock().clone(),
            });
            println!("{report}");
        }
        result
    } else {
        let controller = Arc::new(HttpControllerClient::new(agent_config.controller_base_url.clone(), agent_config.access_token.clone()));
        Executor::new(ExecutorParams {
            job,
            checkout_dir,
            build_id,
            build_number: args.build_number.clone(),
            job_api_socket_path,
            controller,
            clock: SystemClock,
        })
        .run()
        .await
    }
}

fn read_job_config(path: Option<&std::path::Path>) -> Result<JobConfig, AgentError> {
    let raw = match path {
        Some(path) if path != std::path::Path::new("-") => {
            std::fs::read_to_string(path).map_err(|e| AgentError::JobInput(format!("{}: {e}", path.display())))?
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map_err(|e| AgentError::JobInput(e.to_string()))?;
            buf
        }
    };
    Ok(serde_json::from_str(&raw)?)
}

/// Prints the boxed `⚠️ ERROR` marker for a fatal cause (the Executor
/// already logs it to the log file; this is the stderr-visible copy) and
/// returns the process exit code.
fn report_and_exit_code(result: &JobResult) -> i32 {
    if let Some(cause) = &result.cause {
        eprintln!("{}", cause.render_boxed());
    }
    result.exit_code
}
