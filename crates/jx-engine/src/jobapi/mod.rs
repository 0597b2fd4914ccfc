// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Job API Server (§4.11): a local HTTP/1.1 server over a
//! Unix-domain socket, bearer-token gated, letting the running job
//! mutate its own environment and redaction set and write metadata back
//! to the controller. Started before the command phase; torn down with a
//! 10-second drain at pre-exit.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use jx_checkout::MetadataSink;
use jx_daemon::GracefulShutdown;
use jx_redact::MIN_NEEDLE_LEN;
use rand::RngCore;
use tokio::net::UnixListener;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::sinks::RedactorNeedleSink;

const DRAIN_GRACE: Duration = Duration::from_secs(10);

/// 256-bit random bearer token, URL-safe base64 without padding.
pub fn generate_token() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

struct Inner<W, M> {
    shell: Arc<jx_shell::Shell<jx_redact::Redactor<W>>>,
    redactor: jx_redact::Redactor<W>,
    metadata_sink: Arc<M>,
    token: String,
}

/// Cheap to clone: every per-connection task gets its own `Arc` handle
/// onto the same shell/redactor/controller state.
pub struct JobApiServer<W, M> {
    inner: Arc<Inner<W, M>>,
}

impl<W, M> Clone for JobApiServer<W, M> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<W, M> JobApiServer<W, M>
where
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    M: MetadataSink + Send + Sync + 'static,
{
    pub fn new(
        shell: Arc<jx_shell::Shell<jx_redact::Redactor<W>>>,
        redactor: jx_redact::Redactor<W>,
        metadata_sink: Arc<M>,
        token: String,
    ) -> Self {
        Self { inner: Arc::new(Inner { shell, redactor, metadata_sink, token }) }
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    /// Accepts connections until `shutdown` triggers, then drains
    /// already-accepted connections for up to [`DRAIN_GRACE`].
    pub async fn serve(self, listener: UnixListener, shutdown: GracefulShutdown) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let server = self.clone();
                            tasks.spawn(async move { server.handle_connection(stream).await });
                        }
                        Err(err) => tracing::warn!(error = %err, "job api accept failed"),
                    }
                }
            }
        }

        let drain_tasks = async {
            while tasks.join_next().await.is_some() {}
        };
        if jx_daemon::drain(drain_tasks, &shutdown, DRAIN_GRACE).await.is_none() {
            tracing::warn!("job api server drain grace period elapsed with connections still open");
            tasks.abort_all();
        }
    }

    async fn handle_connection(self, stream: tokio::net::UnixStream) {
        let io = TokioIo::new(stream);
        let server = self.clone();
        let service = service_fn(move |req| {
            let server = server.clone();
            async move { Ok::<_, Infallible>(server.route(req).await) }
        });
        if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
            .serve_connection(io, service)
            .instrument(tracing::debug_span!("job_api_connection"))
            .await
        {
            tracing::debug!(error = %err, "job api connection closed with an error");
        }
    }

    async fn route(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        if !self.is_authorized(&req) {
            return error_response(StatusCode::UNAUTHORIZED, "missing or invalid bearer token");
        }

        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match (method, path.as_str()) {
            (hyper::Method::PUT, "/env") => self.handle_set_env(req).await,
            (hyper::Method::GET, p) if p.starts_with("/env/") => self.handle_get_env(&p["/env/".len()..]),
            (hyper::Method::DELETE, p) if p.starts_with("/env/") => self.handle_delete_env(&p["/env/".len()..]),
            (hyper::Method::POST, "/redaction") => self.handle_add_redaction(req).await,
            (hyper::Method::POST, "/metadata") => self.handle_set_metadata(req).await,
            _ => error_response(StatusCode::NOT_FOUND, "no such job api route"),
        }
    }

    fn is_authorized(&self, req: &Request<Incoming>) -> bool {
        let expected = format!("Bearer {}", self.inner.token);
        req.headers()
            .get(hyper::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }

    async fn handle_set_env(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let body = match read_json::<EnvVar>(req).await {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        self.inner.shell.set_env(body.key, body.value);
        json_response(StatusCode::OK, &serde_json::json!({}))
    }

    fn handle_get_env(&self, key: &str) -> Response<Full<Bytes>> {
        let value = self.inner.shell.env_snapshot().get(key).cloned();
        json_response(StatusCode::OK, &serde_json::json!({ "value": value }))
    }

    fn handle_delete_env(&self, key: &str) -> Response<Full<Bytes>> {
        // Matches the Hook Runner's own diff-apply convention: `Shell`
        // exposes no true unset, so a delete is modelled as an empty value.
        self.inner.shell.set_env(key, "");
        json_response(StatusCode::OK, &serde_json::json!({}))
    }

    async fn handle_add_redaction(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let body = match read_json::<RedactionValue>(req).await {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        if body.value.len() < MIN_NEEDLE_LEN {
            return json_response(StatusCode::OK, &serde_json::json!({ "accepted": false }));
        }
        let needles = RedactorNeedleSink(&self.inner.redactor);
        let accepted = jx_secrets::NeedleSink::add_needle(&needles, &body.value);
        json_response(StatusCode::OK, &serde_json::json!({ "accepted": accepted }))
    }

    async fn handle_set_metadata(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let body = match read_json::<MetadataEntry>(req).await {
            Ok(body) => body,
            Err(resp) => return resp,
        };
        match self.inner.metadata_sink.set_metadata(&body.key, &body.value).await {
            Ok(()) => json_response(StatusCode::OK, &serde_json::json!({})),
            Err(err) => error_response(StatusCode::BAD_GATEWAY, &err.to_string()),
        }
    }
}

#[derive(serde::Deserialize)]
struct EnvVar {
    key: String,
    value: String,
}

#[derive(serde::Deserialize)]
struct RedactionValue {
    value: String,
}

#[derive(serde::Deserialize)]
struct MetadataEntry {
    key: String,
    value: String,
}

async fn read_json<T: serde::de::DeserializeOwned>(req: Request<Incoming>) -> Result<T, Response<Full<Bytes>>> {
    let collected = req
        .into_body()
        .collect()
        .await
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "failed to read request body"))?
        .to_bytes();
    serde_json::from_slice(&collected).map_err(|err| error_response(StatusCode::BAD_REQUEST, &err.to_string()))
}

fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_default();
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
