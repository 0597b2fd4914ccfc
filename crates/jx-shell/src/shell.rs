// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use jx_core::CancelSignal;
use jx_process::{ProcessSupervisor, SpawnSpec, WaitStatus};
use tokio::io::AsyncWrite;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::ShellError;
use crate::path;
use crate::script::Interpreter;

/// The in-process "virtual shell": current working directory,
/// environment map, and a command factory producing
/// [`jx_process::ProcessSupervisor`] configurations. `W` is the
/// destination for every command's combined stdout/stderr — typically a
/// `jx_redact::Redactor` wrapping the job's log writer.
pub struct Shell<W> {
    state: Arc<std::sync::Mutex<State>>,
    writer: W,
    pty: bool,
    interrupt_signal: CancelSignal,
    grace_period: Duration,
    /// Guarantees at most one command runs at a time.
    run_guard: Arc<AsyncMutex<()>>,
    current: Arc<std::sync::Mutex<Option<Arc<ProcessSupervisor>>>>,
}

struct State {
    cwd: PathBuf,
    env: BTreeMap<String, String>,
}

impl<W: AsyncWrite + Unpin + Clone + Send + 'static> Shell<W> {
    pub fn new(
        cwd: impl Into<PathBuf>,
        env: BTreeMap<String, String>,
        writer: W,
        pty: bool,
        interrupt_signal: CancelSignal,
        grace_period: Duration,
    ) -> Self {
        Self {
            state: Arc::new(std::sync::Mutex::new(State { cwd: cwd.into(), env })),
            writer,
            pty,
            interrupt_signal,
            grace_period,
            run_guard: Arc::new(AsyncMutex::new(())),
            current: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    pub fn cwd(&self) -> PathBuf {
        self.state.lock().expect("shell state mutex poisoned").cwd.clone()
    }

    pub fn env_snapshot(&self) -> BTreeMap<String, String> {
        self.state.lock().expect("shell state mutex poisoned").env.clone()
    }

    pub fn set_env(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state
            .lock()
            .expect("shell state mutex poisoned")
            .env
            .insert(key.into(), value.into());
    }

    pub fn merge_env(&self, vars: impl IntoIterator<Item = (String, String)>) {
        let mut state = self.state.lock().expect("shell state mutex poisoned");
        for (k, v) in vars {
            state.env.insert(k, v);
        }
    }

    /// Resolve `path` against the current working directory, verify it
    /// exists and is a directory, then update the working directory.
    pub fn chdir(&self, target: impl AsRef<Path>) -> Result<(), ShellError> {
        let mut state = self.state.lock().expect("shell state mutex poisoned");
        let resolved = if target.as_ref().is_absolute() {
            target.as_ref().to_path_buf()
        } else {
            state.cwd.join(target.as_ref())
        };
        if !resolved.is_dir() {
            return Err(ShellError::DirectoryNotFound(resolved));
        }
        state.cwd = resolved;
        Ok(())
    }

    /// Resolve `name` to an absolute executable path via the shell's
    /// current `PATH` (and `PATHEXT` on Windows).
    pub fn absolute_path(&self, name: &str) -> Result<PathBuf, ShellError> {
        let state = self.state.lock().expect("shell state mutex poisoned");
        let path_var = state.env.get("PATH").cloned().unwrap_or_default();
        path::resolve(name, &state.cwd, &path_var)
    }

    /// Build a command factory for `program`, inheriting the shell's
    /// current cwd and env (plus injected `PWD`) at the time it is run.
    pub fn command(&self, program: impl Into<String>, args: Vec<String>) -> Command<'_, W> {
        Command { shell: self, program: program.into(), args, extra_env: BTreeMap::new() }
    }

    /// Run `path` as a script, selecting an interpreter by shebang or
    /// platform convention, with `extra_env` overlaid on the shell's env.
    pub async fn run_script(
        &self,
        path: impl AsRef<Path>,
        extra_env: BTreeMap<String, String>,
    ) -> Result<WaitStatus, ShellError> {
        let path = path.as_ref();
        let (program, args) = match crate::script::detect(path) {
            Interpreter::Direct => (path.to_string_lossy().into_owned(), Vec::new()),
            Interpreter::Via { program } => (
                program.to_string_lossy().into_owned(),
                vec![path.to_string_lossy().into_owned()],
            ),
        };
        let mut cmd = self.command(program, args);
        cmd.extra_env = extra_env;
        cmd.run().await
    }

    /// A detached copy sharing this shell's cwd/env state and writer, for
    /// callers that want to hand a fresh stdin to a single command
    /// without affecting this shell's own `current` tracking.
    pub fn with_stdin(&self) -> Self {
        Self {
            state: self.state.clone(),
            writer: self.writer.clone(),
            pty: self.pty,
            interrupt_signal: self.interrupt_signal,
            grace_period: self.grace_period,
            run_guard: self.run_guard.clone(),
            current: self.current.clone(),
        }
    }

    /// Forwards an interrupt to whatever command is currently running, if
    /// any.
    pub fn interrupt_current(&self) {
        if let Some(supervisor) = self.current.lock().expect("shell state mutex poisoned").as_ref() {
            supervisor.interrupt();
        }
    }
}

/// A single command, bound to the [`Shell`] that will run it.
pub struct Command<'s, W> {
    shell: &'s Shell<W>,
    program: String,
    args: Vec<String>,
    extra_env: BTreeMap<String, String>,
}

impl<'s, W: AsyncWrite + Unpin + Clone + Send + 'static> Command<'s, W> {
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.insert(key.into(), value.into());
        self
    }

    /// Runs the command to completion, writing its combined stdout/stderr
    /// to the shell's writer. Fails with [`ShellError::CommandInProgress`]
    /// if another command is already running through this shell.
    pub async fn run(self) -> Result<WaitStatus, ShellError> {
        let _permit = self
            .shell
            .run_guard
            .try_lock()
            .map_err(|_| ShellError::CommandInProgress)?;
        self.run_locked().await
    }

    /// Same as [`Self::run`], but captures stdout into the returned
    /// buffer instead of writing to the shell's writer.
    pub async fn run_and_capture_stdout(self) -> Result<(WaitStatus, Vec<u8>), ShellError> {
        let _permit = self
            .shell
            .run_guard
            .try_lock()
            .map_err(|_| ShellError::CommandInProgress)?;

        let program = self.shell.absolute_path(&self.program)?;
        let (cwd, env) = self.shell.resolved_env_for_run(&self.extra_env);
        let supervisor = Arc::new(ProcessSupervisor::new(SpawnSpec {
            program,
            args: self.args.clone(),
            env,
            cwd,
            pty: false,
            interrupt_signal: self.shell.interrupt_signal,
            grace_period: self.shell.grace_period,
        }));
        *self.shell.current.lock().expect("shell state mutex poisoned") = Some(supervisor.clone());

        let sink = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let status = supervisor
            .run(None::<tokio::io::Empty>, CaptureSink(sink.clone()))
            .await
            .map_err(ShellError::from)?;
        *self.shell.current.lock().expect("shell state mutex poisoned") = None;
        let captured = sink.lock().clone();
        Ok((status, captured))
    }

    async fn run_locked(self) -> Result<WaitStatus, ShellError> {
        let program = self.shell.absolute_path(&self.program)?;
        let (cwd, env) = self.shell.resolved_env_for_run(&self.extra_env);
        let supervisor = Arc::new(ProcessSupervisor::new(SpawnSpec {
            program,
            args: self.args,
            env,
            cwd,
            pty: self.shell.pty,
            interrupt_signal: self.shell.interrupt_signal,
            grace_period: self.shell.grace_period,
        }));
        *self.shell.current.lock().expect("shell state mutex poisoned") = Some(supervisor.clone());
        let status = supervisor
            .run(None::<tokio::io::Empty>, self.shell.writer.clone())
            .await
            .map_err(ShellError::from);
        *self.shell.current.lock().expect("shell state mutex poisoned") = None;
        status
    }
}

impl<W> Shell<W> {
    fn resolved_env_for_run(&self, extra_env: &BTreeMap<String, String>) -> (PathBuf, Vec<(String, String)>) {
        let state = self.state.lock().expect("shell state mutex poisoned");
        let mut env: BTreeMap<String, String> = state.env.clone();
        env.insert("PWD".to_string(), state.cwd.to_string_lossy().into_owned());
        for (k, v) in extra_env {
            env.insert(k.clone(), v.clone());
        }
        (state.cwd.clone(), env.into_iter().collect())
    }
}

/// An in-memory stdout sink for [`Command::run_and_capture_stdout`].
#[derive(Clone)]
struct CaptureSink(Arc<parking_lot::Mutex<Vec<u8>>>);

impl AsyncWrite for CaptureSink {
    fn poll_write(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        self.0.lock().extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;
