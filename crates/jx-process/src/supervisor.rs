// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Process Supervisor: launches a child in its own process group,
//! optionally behind a PTY, and guarantees no descendant outlives the
//! executor.

use std::os::fd::FromRawFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use jx_core::CancelSignal;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};

use crate::error::SupervisorError;
use crate::group::ProcessGroup;

/// Parameters for one child process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    pub pty: bool,
    pub interrupt_signal: CancelSignal,
    pub grace_period: Duration,
}

/// The child's terminal status: a normal exit code, or the name of the
/// signal that ended it (POSIX) / a synthetic status (Windows).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitStatus {
    pub code: Option<i32>,
    pub signal: Option<String>,
}

impl WaitStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

enum State {
    NotStarted,
    Running { pid: u32 },
    Exited(WaitStatus),
}

/// Owns a single child process for its whole lifetime. Spawned once via
/// [`ProcessSupervisor::run`]; a second call fails with
/// [`SupervisorError::ProcessNotStarted`].
pub struct ProcessSupervisor {
    spec: SpawnSpec,
    state: Mutex<State>,
    group: Mutex<Option<ProcessGroup>>,
    started: AtomicBool,
    done: Notify,
    cancel: Notify,
    cancel_requested: AtomicBool,
    terminate_requested: AtomicBool,
}

impl ProcessSupervisor {
    pub fn new(spec: SpawnSpec) -> Self {
        Self {
            spec,
            state: Mutex::new(State::NotStarted),
            group: Mutex::new(None),
            started: AtomicBool::new(false),
            done: Notify::new(),
            cancel: Notify::new(),
            cancel_requested: AtomicBool::new(false),
            terminate_requested: AtomicBool::new(false),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        match &*self.state.lock() {
            State::Running { pid } => Some(*pid),
            _ => None,
        }
    }

    pub fn wait_status(&self) -> Option<WaitStatus> {
        match &*self.state.lock() {
            State::Exited(status) => Some(status.clone()),
            _ => None,
        }
    }

    /// Request the process group be sent the configured interrupt signal;
    /// a grace-period watcher (spawned from [`Self::run`]) escalates to
    /// `Terminate` if the child hasn't exited in time. A no-op before
    /// start or after exit.
    pub fn interrupt(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
        self.cancel.notify_waiters();
    }

    /// Request immediate `SIGKILL`/job-object termination. A no-op before
    /// start or after exit.
    pub fn terminate(&self) {
        self.terminate_requested.store(true, Ordering::SeqCst);
        self.cancel_requested.store(true, Ordering::SeqCst);
        self.cancel.notify_waiters();
    }

    /// Resolves once the child has exited.
    pub async fn done(&self) {
        loop {
            if matches!(&*self.state.lock(), State::Exited(_)) {
                return;
            }
            self.done.notified().await;
        }
    }

    /// Spawn and run the child to completion, copying its output to
    /// `writer` and feeding `stdin` (if any) to its standard input.
    /// Blocks until the child exits or is killed.
    pub async fn run<R, W>(&self, stdin: Option<R>, writer: W) -> Result<WaitStatus, SupervisorError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SupervisorError::ProcessNotStarted);
        }

        if self.spec.pty {
            #[cfg(unix)]
            {
                return self.run_pty(writer).await;
            }
            #[cfg(not(unix))]
            {
                tracing::warn!("pty requested but unavailable on this platform; falling back");
            }
        }

        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .current_dir(&self.spec.cwd)
            .env_clear()
            .envs(self.spec.env.iter().cloned())
            .stdin(if stdin.is_some() {
                std::process::Stdio::piped()
            } else {
                std::process::Stdio::null()
            })
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        new_process_group(&mut cmd);

        let mut child = cmd.spawn().map_err(SupervisorError::Spawn)?;
        let pid = child.id().unwrap_or(0);
        *self.state.lock() = State::Running { pid };

        let group = make_group(pid)?;
        *self.group.lock() = Some(group);

        if let Some(mut reader) = stdin {
            if let Some(mut child_stdin) = child.stdin.take() {
                tokio::spawn(async move {
                    let _ = tokio::io::copy(&mut reader, &mut child_stdin).await;
                });
            }
        }

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
        if let Some(stdout) = child.stdout.take() {
            spawn_pump(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pump(stderr, tx.clone());
        }
        drop(tx);

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(chunk) = rx.recv().await {
                if writer.write_all(&chunk).await.is_err() {
                    break;
                }
            }
            let _ = writer.flush().await;
        });

        let wait_result = self.wait_with_cancellation(&mut child).await;
        let _ = writer_task.await;

        let status = match wait_result {
            Ok(exit_status) => to_wait_status(exit_status),
            Err(e) => return Err(SupervisorError::Wait(e)),
        };
        *self.state.lock() = State::Exited(status.clone());
        self.done.notify_waiters();
        Ok(status)
    }

    /// Races the child's exit against interrupt/terminate requests,
    /// escalating an interrupt to `SIGKILL`/job termination after the
    /// configured grace period, so `wait` returns within `grace_period + ε`
    /// of any cancel signal.
    async fn wait_with_cancellation(
        &self,
        child: &mut tokio::process::Child,
    ) -> std::io::Result<std::process::ExitStatus> {
        let wait_fut = child.wait();
        tokio::pin!(wait_fut);

        let mut interrupted = false;
        let mut grace_deadline: Option<tokio::time::Instant> = None;

        loop {
            let grace_sleep = async {
                match grace_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                result = &mut wait_fut => return result,

                () = grace_sleep, if grace_deadline.is_some() => {
                    if let Some(group) = self.group.lock().as_ref() {
                        let _ = group.kill();
                    }
                    grace_deadline = None;
                }

                _ = self.cancel.notified() => {
                    if self.terminate_requested.load(Ordering::SeqCst) {
                        if let Some(group) = self.group.lock().as_ref() {
                            let _ = group.kill();
                        }
                        grace_deadline = None;
                    } else if !interrupted {
                        interrupted = true;
                        if let Some(group) = self.group.lock().as_ref() {
                            let _ = group.signal(self.spec.interrupt_signal);
                        }
                        grace_deadline =
                            Some(tokio::time::Instant::now() + self.spec.grace_period);
                    }
                }
            }
        }
    }

    #[cfg(unix)]
    async fn run_pty<W>(&self, writer: W) -> Result<WaitStatus, SupervisorError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        use std::os::fd::AsRawFd;

        let pty = crate::pty::open()?;
        crate::pty::set_raw(&pty.slave)?;

        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .current_dir(&self.spec.cwd)
            .env_clear()
            .envs(self.spec.env.iter().cloned())
            .env("TERM", "xterm-256color");

        let slave_fd = pty.slave.as_raw_fd();
        // SAFETY: `slave_fd` stays open (owned by `pty.slave`) until after
        // `cmd.spawn()` duplicates it into the child.
        unsafe {
            cmd.stdin(std::process::Stdio::from_raw_fd(libc_dup(slave_fd)?));
            cmd.stdout(std::process::Stdio::from_raw_fd(libc_dup(slave_fd)?));
            cmd.stderr(std::process::Stdio::from_raw_fd(libc_dup(slave_fd)?));
        }
        new_process_group(&mut cmd);

        let mut child = cmd.spawn().map_err(SupervisorError::Spawn)?;
        let pid = child.id().unwrap_or(0);
        *self.state.lock() = State::Running { pid };
        let group = make_group(pid)?;
        *self.group.lock() = Some(group);
        drop(pty.slave);

        let master_fd = crate::pty::raw_fd_of(&pty.master);
        let async_master = tokio::io::unix::AsyncFd::new(pty.master)
            .map_err(SupervisorError::Pty)?;
        let mut writer = writer;
        let copy_task = tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                let mut guard = match async_master.readable().await {
                    Ok(g) => g,
                    Err(_) => break,
                };
                match guard.try_io(|inner| {
                    let fd = inner.get_ref().as_raw_fd();
                    let n = unsafe {
                        libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
                    };
                    if n < 0 {
                        Err(std::io::Error::last_os_error())
                    } else {
                        Ok(n as usize)
                    }
                }) {
                    Ok(Ok(0)) => break,
                    Ok(Ok(n)) => {
                        if writer.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                    Ok(Err(e)) if crate::pty::is_benign_eio(&e) => break,
                    Ok(Err(_)) => break,
                    Err(_would_block) => continue,
                }
            }
            let _ = writer.flush().await;
            let _ = master_fd;
        });

        let wait_result = self.wait_with_cancellation(&mut child).await;
        let _ = copy_task.await;
        let status = match wait_result {
            Ok(exit_status) => to_wait_status(exit_status),
            Err(e) => return Err(SupervisorError::Wait(e)),
        };
        *self.state.lock() = State::Exited(status.clone());
        self.done.notify_waiters();
        Ok(status)
    }
}

#[cfg(unix)]
fn libc_dup(fd: std::os::fd::RawFd) -> Result<std::os::fd::RawFd, SupervisorError> {
    // SAFETY: `fd` is a valid, open descriptor owned by the caller for the
    // duration of this call.
    let dup = unsafe { libc::dup(fd) };
    if dup < 0 {
        Err(SupervisorError::Pty(std::io::Error::last_os_error()))
    } else {
        Ok(dup)
    }
}

fn spawn_pump<R: AsyncRead + Unpin + Send + 'static>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    tokio::spawn(async move {
        use tokio::io::AsyncReadExt;
        let mut buf = vec![0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(unix)]
fn new_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
fn new_process_group(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(unix)]
fn make_group(pid: u32) -> Result<ProcessGroup, SupervisorError> {
    Ok(ProcessGroup::of_leader(pid))
}

#[cfg(windows)]
fn make_group(pid: u32) -> Result<ProcessGroup, SupervisorError> {
    ProcessGroup::create_and_assign(pid)
}

#[cfg(unix)]
fn to_wait_status(status: std::process::ExitStatus) -> WaitStatus {
    use std::os::unix::process::ExitStatusExt;
    WaitStatus {
        code: status.code(),
        signal: status.signal().map(signal_name),
    }
}

#[cfg(unix)]
fn signal_name(signum: i32) -> String {
    nix::sys::signal::Signal::try_from(signum)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| signum.to_string())
}

#[cfg(windows)]
fn to_wait_status(status: std::process::ExitStatus) -> WaitStatus {
    WaitStatus {
        code: status.code(),
        signal: None,
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
