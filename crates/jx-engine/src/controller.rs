// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ControllerClient`: the narrow interface to the named-but-external
//! controller (§6 of the spec). An HTTP implementation built on the same
//! `hyper`/`hyper-util` stack already pulled in for the Job API Server,
//! and a `FakeControllerClient` for tests. Neither `SecretSource`
//! (`jx-secrets`) nor `MetadataSink` (`jx-checkout`) can be implemented
//! generically for `impl<T: ControllerClient> ... for T` — both traits
//! are foreign to this crate and `T` stays foreign too under the orphan
//! rule. `JobScopedController<C>` is the local wrapper type that carries
//! both impls instead, for any `C: ControllerClient`.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use jx_core::{JobId, JobResult, SignalReason};
use parking_lot::Mutex;

/// The controller operations the executor needs, per `spec.md` §6.
#[async_trait::async_trait]
pub trait ControllerClient: Send + Sync + 'static {
    async fn get_secret(&self, job_id: &JobId, key: &str) -> Result<String, String>;
    async fn upload_artifacts(&self, job_id: &JobId, paths: &[String]) -> Result<(), String>;
    async fn set_metadata(&self, job_id: &JobId, key: &str, value: &str) -> Result<(), String>;
    async fn exists_metadata(&self, job_id: &JobId, key: &str) -> Result<bool, String>;
    async fn append_log_chunk(&self, job_id: &JobId, offset: u64, data: &[u8]) -> Result<(), String>;
    async fn finish_job(&self, job_id: &JobId, result: &JobResult) -> Result<(), String>;
}

fn signal_reason_str(reason: Option<SignalReason>) -> Option<&'static str> {
    reason.map(SignalReason::as_str)
}

/// Plain-HTTP controller client (no TLS crate is part of this workspace's
/// stack; a production deployment would sit behind a TLS-terminating
/// proxy or would need `hyper-rustls` added deliberately — see DESIGN.md).
pub struct HttpControllerClient {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
    access_token: String,
}

impl HttpControllerClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    fn request(&self, method: hyper::Method, path: &str, body: Vec<u8>) -> Result<Request<Full<Bytes>>, String> {
        Request::builder()
            .method(method)
            .uri(format!("{}{}", self.base_url, path))
            .header("authorization", format!("Bearer {}", self.access_token))
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| e.to_string())
    }

    async fn send_json(&self, method: hyper::Method, path: &str, body: serde_json::Value) -> Result<Bytes, String> {
        let payload = serde_json::to_vec(&body).map_err(|e| e.to_string())?;
        let req = self.request(method, path, payload)?;
        let resp = self.client.request(req).await.map_err(|e| e.to_string())?;
        let status = resp.status();
        let collected = resp.into_body().collect().await.map_err(|e| e.to_string())?.to_bytes();
        if status != StatusCode::OK {
            let message = serde_json::from_slice::<serde_json::Value>(&collected)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("controller returned {status}"));
            return Err(message);
        }
        Ok(collected)
    }
}

#[async_trait::async_trait]
impl ControllerClient for HttpControllerClient {
    async fn get_secret(&self, job_id: &JobId, key: &str) -> Result<String, String> {
        let path = format!("/jobs/{}/secrets/{}", job_id.as_str(), key);
        let body = self.send_json(hyper::Method::GET, &path, serde_json::Value::Null).await?;
        let parsed: serde_json::Value = serde_json::from_slice(&body).map_err(|e| e.to_string())?;
        parsed
            .get("value")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| "malformed secret response".to_string())
    }

    async fn upload_artifacts(&self, job_id: &JobId, paths: &[String]) -> Result<(), String> {
        let path = format!("/jobs/{}/artifacts", job_id.as_str());
        self.send_json(hyper::Method::POST, &path, serde_json::json!({ "paths": paths })).await?;
        Ok(())
    }

    async fn set_metadata(&self, job_id: &JobId, key: &str, value: &str) -> Result<(), String> {
        let path = format!("/jobs/{}/metadata", job_id.as_str());
        self.send_json(hyper::Method::POST, &path, serde_json::json!({ "key": key, "value": value })).await?;
        Ok(())
    }

    async fn exists_metadata(&self, job_id: &JobId, key: &str) -> Result<bool, String> {
        let path = format!("/jobs/{}/metadata/{}/exists", job_id.as_str(), key);
        let body = self.send_json(hyper::Method::GET, &path, serde_json::Value::Null).await?;
        let parsed: serde_json::Value = serde_json::from_slice(&body).map_err(|e| e.to_string())?;
        Ok(parsed.get("exists").and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn append_log_chunk(&self, job_id: &JobId, offset: u64, data: &[u8]) -> Result<(), String> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        let path = format!("/jobs/{}/log-chunks", job_id.as_str());
        let encoded = STANDARD.encode(data);
        self.send_json(hyper::Method::POST, &path, serde_json::json!({ "offset": offset, "data": encoded })).await?;
        Ok(())
    }

    async fn finish_job(&self, job_id: &JobId, result: &JobResult) -> Result<(), String> {
        let path = format!("/jobs/{}/finish", job_id.as_str());
        self.send_json(
            hyper::Method::POST,
            &path,
            serde_json::json!({
                "exit_status": result.exit_code,
                "signal_reason": signal_reason_str(result.signal_reason),
            }),
        )
        .await?;
        Ok(())
    }
}

/// In-memory controller double for tests: records every call it receives.
#[derive(Default)]
pub struct FakeControllerClient {
    pub secrets: Mutex<BTreeMap<String, Result<String, String>>>,
    pub metadata: Mutex<BTreeMap<String, String>>,
    pub log_chunks: Mutex<Vec<(u64, Vec<u8>)>>,
    pub artifacts: Mutex<Vec<String>>,
    pub finished: Mutex<Option<(i32, Option<&'static str>)>>,
}

impl FakeControllerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, key: impl Into<String>, value: Result<&str, &str>) -> Self {
        self.secrets.lock().insert(key.into(), value.map(str::to_string).map_err(str::to_string));
        self
    }
}

#[async_trait::async_trait]
impl ControllerClient for FakeControllerClient {
    async fn get_secret(&self, _job_id: &JobId, key: &str) -> Result<String, String> {
        self.secrets
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| Err(format!("no such secret: {key}")))
    }

    async fn upload_artifacts(&self, _job_id: &JobId, paths: &[String]) -> Result<(), String> {
        self.artifacts.lock().extend(paths.iter().cloned());
        Ok(())
    }

    async fn set_metadata(&self, _job_id: &JobId, key: &str, value: &str) -> Result<(), String> {
        self.metadata.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn exists_metadata(&self, _job_id: &JobId, key: &str) -> Result<bool, String> {
        Ok(self.metadata.lock().contains_key(key))
    }

    async fn append_log_chunk(&self, _job_id: &JobId, offset: u64, data: &[u8]) -> Result<(), String> {
        self.log_chunks.lock().push((offset, data.to_vec()));
        Ok(())
    }

    async fn finish_job(&self, _job_id: &JobId, result: &JobResult) -> Result<(), String> {
        *self.finished.lock() = Some((result.exit_code, signal_reason_str(result.signal_reason)));
        Ok(())
    }
}

/// Shares one `ControllerClient` (either concrete type, behind a trait
/// object) across the Secrets Pipeline, Checkout Engine, and Job API
/// Server for a single job, without re-deriving the orphan-rule dance for
/// every caller.
pub struct JobScopedController<C> {
    pub inner: Arc<C>,
    pub job_id: JobId,
}

impl<C: ControllerClient> JobScopedController<C> {
    pub fn new(inner: Arc<C>, job_id: JobId) -> Self {
        Self { inner, job_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_controller_records_log_chunks_and_finish() {
        let fake = FakeControllerClient::new();
        let job_id = JobId::new("job-1");
        fake.append_log_chunk(&job_id, 0, b"hello").await.unwrap();
        fake.finish_job(&job_id, &JobResult::command_exit(0)).await.unwrap();
        assert_eq!(fake.log_chunks.lock().as_slice(), [(0, b"hello".to_vec())]);
        assert_eq!(*fake.finished.lock(), Some((0, None)));
    }

    #[tokio::test]
    async fn job_scoped_controller_binds_job_id_to_secret_source() {
        let fake = Arc::new(FakeControllerClient::new().with_secret("DB", Ok("postgres://x")));
        let scoped = JobScopedController::new(fake, JobId::new("job-9"));
        let value = jx_secrets::SecretSource::get_secret(&scoped, "ignored", "DB").await.unwrap();
        assert_eq!(value, "postgres://x");
    }

    #[tokio::test]
    async fn job_scoped_controller_forwards_artifact_uploads() {
        let fake = Arc::new(FakeControllerClient::new());
        let scoped = JobScopedController::new(fake.clone(), JobId::new("job-artifacts"));
        let paths = vec!["dist/app.tar.gz".to_string(), "dist/checksums.txt".to_string()];
        ArtifactSink::upload_artifacts(&scoped, &paths).await.unwrap();
        assert_eq!(fake.artifacts.lock().as_slice(), paths.as_slice());
    }
}

#[async_trait::async_trait]
impl<C: ControllerClient> jx_secrets::SecretSource for JobScopedController<C> {
    async fn get_secret(&self, _job_id: &str, key: &str) -> Result<String, String> {
        self.inner.get_secret(&self.job_id, key).await
    }
}

#[async_trait::async_trait]
impl<C: ControllerClient> jx_checkout::MetadataSink for JobScopedController<C> {
    async fn set_metadata(&self, key: &str, value: &str) -> Result<(), jx_checkout::CheckoutError> {
        self.inner
            .set_metadata(&self.job_id, key, value)
            .await
            .map_err(jx_checkout::CheckoutError::Metadata)
    }
}

/// The artifact phase's only collaborator: hands a resolved file list to
/// the controller. Kept as its own trait (rather than a direct
/// `ControllerClient` dependency on the Phase Engine) so the engine stays
/// testable against a bare double without pulling in every controller
/// operation it doesn't use.
#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync + 'static {
    async fn upload_artifacts(&self, paths: &[String]) -> Result<(), crate::error::EngineError>;
}

#[async_trait::async_trait]
impl<C: ControllerClient> ArtifactSink for JobScopedController<C> {
    async fn upload_artifacts(&self, paths: &[String]) -> Result<(), crate::error::EngineError> {
        self.inner
            .upload_artifacts(&self.job_id, paths)
            .await
            .map_err(crate::error::EngineError::Controller)
    }
}
