// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jx_core::CancelSignal;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;

/// An owned, cloneable sink so tests can both hand a writer to `run()`
/// (which takes ownership) and inspect what was written afterward.
#[derive(Clone, Default)]
struct SharedBuf(Arc<parking_lot::Mutex<Vec<u8>>>);

impl SharedBuf {
    fn snapshot(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl AsyncWrite for SharedBuf {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        self.0.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn spec(program: &str, args: &[&str]) -> SpawnSpec {
    SpawnSpec {
        program: program.into(),
        args: args.iter().map(|s| s.to_string()).collect(),
        env: vec![("PATH".to_string(), std::env::var("PATH").unwrap_or_default())],
        cwd: std::env::temp_dir(),
        pty: false,
        interrupt_signal: CancelSignal::Terminate,
        grace_period: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn run_captures_stdout_into_writer() {
    let sup = ProcessSupervisor::new(spec("echo", &["hello"]));
    let out = SharedBuf::default();
    let status = sup
        .run::<Cursor<Vec<u8>>, _>(None, out.clone())
        .await
        .unwrap();
    assert!(status.success());
    assert_eq!(String::from_utf8_lossy(&out.snapshot()).trim(), "hello");
}

#[tokio::test]
async fn pid_is_none_before_start_and_status_set_after() {
    let sup = ProcessSupervisor::new(spec("true", &[]));
    assert_eq!(sup.pid(), None);
    sup.run::<Cursor<Vec<u8>>, _>(None, SharedBuf::default())
        .await
        .unwrap();
    assert!(sup.wait_status().is_some());
}

#[tokio::test]
async fn second_run_fails_with_process_not_started() {
    let sup = ProcessSupervisor::new(spec("true", &[]));
    sup.run::<Cursor<Vec<u8>>, _>(None, SharedBuf::default())
        .await
        .unwrap();
    let err = sup
        .run::<Cursor<Vec<u8>>, _>(None, SharedBuf::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::ProcessNotStarted));
}

#[tokio::test]
async fn interrupt_before_grace_period_elapses_lets_process_exit_on_its_own() {
    let sup = Arc::new(ProcessSupervisor::new(spec("sleep", &["0.05"])));
    let sup2 = sup.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        sup2.interrupt();
    });
    let status = sup
        .run::<Cursor<Vec<u8>>, _>(None, SharedBuf::default())
        .await
        .unwrap();
    assert!(status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn terminate_kills_a_long_running_process_within_grace_period() {
    let sup = Arc::new(ProcessSupervisor::new(spec("sleep", &["30"])));
    let sup2 = sup.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        sup2.terminate();
    });
    let started = tokio::time::Instant::now();
    let status = sup
        .run::<Cursor<Vec<u8>>, _>(None, SharedBuf::default())
        .await
        .unwrap();
    assert!(!status.success());
    assert!(started.elapsed() < Duration::from_secs(5));
}
