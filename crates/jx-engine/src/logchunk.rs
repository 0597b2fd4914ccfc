// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batches the Redacting Streamer's output into bounded chunks before
//! handing them to [`crate::controller::ControllerClient::append_log_chunk`],
//! rather than issuing one controller call per `write`.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use jx_core::JobId;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::controller::ControllerClient;

/// Default flush threshold: once buffered bytes reach this size the
/// chunk is handed off, independent of write boundaries.
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 64 * 1024;

/// An `AsyncWrite` sink that accumulates bytes locally and forwards full
/// chunks to a background task, which serializes calls to the
/// controller and tracks the running byte offset.
pub struct LogChunker {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    buffer: Vec<u8>,
    max_chunk_bytes: usize,
}

impl LogChunker {
    pub fn spawn<C: ControllerClient>(
        controller: std::sync::Arc<C>,
        job_id: JobId,
        max_chunk_bytes: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let handle = tokio::spawn(async move {
            let mut offset: u64 = 0;
            while let Some(chunk) = rx.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                if let Err(err) = controller.append_log_chunk(&job_id, offset, &chunk).await {
                    tracing::warn!(error = %err, offset, "failed to append log chunk");
                }
                offset += chunk.len() as u64;
            }
        });
        (Self { tx, buffer: Vec::new(), max_chunk_bytes }, handle)
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut self.buffer);
        // The background task outlives transient receiver drops only
        // when the caller holds the `JoinHandle`; a closed channel here
        // means the job is tearing down, so dropping the chunk is fine.
        let _ = self.tx.send(chunk);
    }
}

impl AsyncWrite for LogChunker {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.max_chunk_bytes {
            self.flush_buffer();
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.flush_buffer();
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.flush_buffer();
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FakeControllerClient;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn flushes_once_threshold_reached() {
        let controller = Arc::new(FakeControllerClient::new());
        let (mut chunker, handle) = LogChunker::spawn(controller.clone(), JobId::new("job-1"), 8);
        chunker.write_all(b"abcdefgh").await.unwrap();
        chunker.write_all(b"ij").await.unwrap();
        chunker.shutdown().await.unwrap();
        drop(chunker);
        handle.await.unwrap();
        let chunks = controller.log_chunks.lock();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], (0, b"abcdefgh".to_vec()));
        assert_eq!(chunks[1], (8, b"ij".to_vec()));
    }

    #[tokio::test]
    async fn small_writes_stay_buffered_until_flush() {
        let controller = Arc::new(FakeControllerClient::new());
        let (mut chunker, handle) = LogChunker::spawn(controller.clone(), JobId::new("job-1"), 1024);
        chunker.write_all(b"hello").await.unwrap();
        assert!(controller.log_chunks.lock().is_empty());
        chunker.flush().await.unwrap();
        drop(chunker);
        handle.await.unwrap();
        assert_eq!(controller.log_chunks.lock().as_slice(), [(0, b"hello".to_vec())]);
    }
}
