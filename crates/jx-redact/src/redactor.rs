// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The streaming redactor itself.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::io::AsyncWrite;

use crate::needles::NeedleSet;

struct Inner<W> {
    writer: W,
    needles: NeedleSet,
    substitution: Vec<u8>,
    /// Bytes received but not yet resolved: either literal bytes pending
    /// a flush-to-writer attempt, or a tail that could still grow into a
    /// match with more data.
    straddle: Vec<u8>,
    /// Resolved output bytes not yet accepted by the downstream writer.
    pending_out: Vec<u8>,
    pending_pos: usize,
}

impl<W> Inner<W> {
    /// Scans `straddle` (already containing any carried-over tail) and
    /// appends newly-resolved bytes to `pending_out`, leaving in
    /// `straddle` only a genuine prefix of some needle.
    fn process(&mut self) {
        if self.needles.is_empty() {
            self.pending_out.append(&mut self.straddle);
            return;
        }

        let buf = std::mem::take(&mut self.straddle);
        let mut i = 0;
        while i < buf.len() {
            if let Some(len) = self.needles.longest_match_at_start(&buf[i..]) {
                self.pending_out.extend_from_slice(&self.substitution);
                i += len;
                continue;
            }
            if self.needles.is_potential_prefix(&buf[i..]) {
                break;
            }
            // Line terminators are pushed through promptly even mid-scan,
            // per the "avoid holding back progress output" contract —
            // already satisfied here since a `\n` can't be a needle
            // prefix unless a needle itself starts with one.
            self.pending_out.push(buf[i]);
            i += 1;
        }
        self.straddle = buf[i..].to_vec();
    }
}

/// Wraps a downstream async writer, redacting a dynamic needle set across
/// write boundaries. Cheap to clone: internal state is shared via `Arc`.
pub struct Redactor<W> {
    inner: Arc<Mutex<Inner<W>>>,
}

impl<W> Clone for Redactor<W> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<W: AsyncWrite + Unpin> Redactor<W> {
    pub fn new(writer: W, substitution: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                writer,
                needles: NeedleSet::new(),
                substitution: substitution.into(),
                straddle: Vec::new(),
                pending_out: Vec::new(),
                pending_pos: 0,
            })),
        }
    }

    pub fn with_needles<I, B>(writer: W, substitution: impl Into<Vec<u8>>, needles: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let redactor = Self::new(writer, substitution);
        redactor.reset(needles);
        redactor
    }

    /// Atomically swap the needle set; in-flight buffered bytes are
    /// rescanned against the new set.
    pub fn reset<I, B>(&self, needles: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let mut inner = self.inner.lock();
        inner.needles = NeedleSet::replace_all(needles);
        inner.process();
    }

    /// Register one runtime-discovered secret (Job API "add redaction
    /// string", Secrets Pipeline). Enforces the minimum needle length.
    pub fn add_needle(&self, needle: impl Into<Vec<u8>>) -> bool {
        let mut inner = self.inner.lock();
        let accepted = inner.needles.insert_one(needle.into());
        if accepted {
            inner.process();
        }
        accepted
    }

    fn drain_pending(inner: &mut Inner<W>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while inner.pending_pos < inner.pending_out.len() {
            match Pin::new(&mut inner.writer).poll_write(cx, &inner.pending_out[inner.pending_pos..]) {
                Poll::Ready(Ok(0)) => {
                    return Poll::Ready(Err(io::Error::new(io::ErrorKind::WriteZero, "write zero")))
                }
                Poll::Ready(Ok(n)) => inner.pending_pos += n,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
        inner.pending_out.clear();
        inner.pending_pos = 0;
        Poll::Ready(Ok(()))
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for Redactor<W> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let mut inner = this.inner.lock();
        if let Poll::Pending = Self::drain_pending(&mut inner, cx) {
            return Poll::Pending;
        }
        inner.straddle.extend_from_slice(buf);
        inner.process();
        // Best-effort immediate flush attempt; any remainder stays in
        // `pending_out` for the next poll_write/poll_flush.
        let _ = Self::drain_pending(&mut inner, cx);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let mut inner = this.inner.lock();
        match Self::drain_pending(&mut inner, cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }
        Pin::new(&mut inner.writer).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let mut inner = this.inner.lock();
        match Self::drain_pending(&mut inner, cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Ready(Ok(())) => {}
        }
        Pin::new(&mut inner.writer).poll_shutdown(cx)
    }
}
