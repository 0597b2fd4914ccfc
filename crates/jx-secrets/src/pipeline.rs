// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! All-or-nothing secret fetch, then per-secret processor dispatch.

use jx_core::SecretRequest;

use crate::error::{FailedSecret, SecretsError};
use crate::processor::Processor;

/// The narrow capability the pipeline needs from the controller
/// connection: fetching one named secret for one job.
#[async_trait::async_trait]
pub trait SecretSource: Send + Sync {
    async fn get_secret(&self, job_id: &str, key: &str) -> Result<String, String>;
}

pub struct SecretsPipeline;

impl SecretsPipeline {
    /// Fetches every request in `requests` from `source`. If any fetch
    /// fails, no value in this batch is handed to a processor and the
    /// aggregate error names every failed key (never a value). On full
    /// success, each value is handed to the first processor in
    /// `processors` that claims it; every value (fetched or not) is
    /// overwritten in memory before this call returns.
    pub async fn fetch_all(
        job_id: &str,
        requests: &[SecretRequest],
        source: &dyn SecretSource,
        processors: &[&dyn Processor],
    ) -> Result<(), SecretsError> {
        let mut fetched: Vec<(SecretRequest, String)> = Vec::with_capacity(requests.len());
        let mut failed: Vec<FailedSecret> = Vec::new();

        for request in requests {
            match source.get_secret(job_id, &request.key).await {
                Ok(value) => fetched.push((request.clone(), value)),
                Err(message) => failed.push(FailedSecret { key: request.key.clone(), message }),
            }
        }

        if !failed.is_empty() {
            for (_, value) in fetched {
                zero(value);
            }
            tracing::warn!(failed = ?failed, "secrets pipeline: all-or-nothing fetch failed");
            return Err(SecretsError::FetchFailed(failed));
        }

        let mut outcome = Ok(());
        for (request, value) in fetched {
            if outcome.is_ok() {
                outcome = dispatch(&request, &value, processors);
            }
            zero(value);
        }
        outcome
    }
}

fn dispatch(request: &SecretRequest, value: &str, processors: &[&dyn Processor]) -> Result<(), SecretsError> {
    match processors.iter().find(|p| p.supports(request)) {
        Some(processor) => processor.process(request, value),
        None => Err(SecretsError::Unclaimed(request.key.clone())),
    }
}

/// Best-effort in-memory scrub: overwrite the secret's backing bytes
/// before the `String` is dropped.
fn zero(value: String) {
    let mut bytes = value.into_bytes();
    for b in bytes.iter_mut() {
        *b = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{EnvSink, NeedleSink};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    struct FakeSource {
        values: BTreeMap<&'static str, Result<&'static str, &'static str>>,
    }

    #[async_trait::async_trait]
    impl SecretSource for FakeSource {
        async fn get_secret(&self, _job_id: &str, key: &str) -> Result<String, String> {
            match self.values.get(key) {
                Some(Ok(v)) => Ok(v.to_string()),
                Some(Err(e)) => Err(e.to_string()),
                None => Err("no such secret".to_string()),
            }
        }
    }

    #[derive(Default)]
    struct FakeEnv(Mutex<BTreeMap<String, String>>);
    impl EnvSink for FakeEnv {
        fn set_env(&self, key: &str, value: &str) {
            self.0.lock().insert(key.to_string(), value.to_string());
        }
    }

    #[derive(Default)]
    struct FakeNeedles;
    impl NeedleSink for FakeNeedles {
        fn add_needle(&self, _needle: &str) -> bool {
            true
        }
    }

    fn requests() -> Vec<SecretRequest> {
        vec![
            SecretRequest { key: "DATABASE_URL".to_string(), env_var: "DATABASE_URL".to_string() },
            SecretRequest { key: "API_TOKEN".to_string(), env_var: "API_TOKEN".to_string() },
            SecretRequest { key: "MISSING".to_string(), env_var: "MISSING".to_string() },
        ]
    }

    #[tokio::test]
    async fn all_or_nothing_failure_sets_no_env_vars() {
        let source = FakeSource {
            values: BTreeMap::from([
                ("DATABASE_URL", Ok("postgres://...")),
                ("API_TOKEN", Err("fetch failed: 500")),
            ]),
        };
        let env = FakeEnv::default();
        let needles = FakeNeedles;
        let processor = crate::processor::EnvVarProcessor::new(&env, &needles);
        let processors: Vec<&dyn Processor> = vec![&processor];

        let err = SecretsPipeline::fetch_all("job-1", &requests(), &source, &processors)
            .await
            .unwrap_err();

        assert!(env.0.lock().is_empty());
        let message = err.to_string();
        assert!(message.contains("API_TOKEN"));
        assert!(message.contains("MISSING"));
    }

    #[tokio::test]
    async fn full_success_dispatches_every_value() {
        let source = FakeSource {
            values: BTreeMap::from([
                ("DATABASE_URL", Ok("postgres://...")),
                ("API_TOKEN", Ok("tok-abc123")),
                ("MISSING", Ok("present-after-all")),
            ]),
        };
        let env = FakeEnv::default();
        let needles = FakeNeedles;
        let processor = crate::processor::EnvVarProcessor::new(&env, &needles);
        let processors: Vec<&dyn Processor> = vec![&processor];

        SecretsPipeline::fetch_all("job-1", &requests(), &source, &processors)
            .await
            .unwrap();

        assert_eq!(env.0.lock().get("DATABASE_URL"), Some(&"postgres://...".to_string()));
        assert_eq!(env.0.lock().get("API_TOKEN"), Some(&"tok-abc123".to_string()));
    }

    #[tokio::test]
    async fn unclaimed_secret_is_an_error() {
        let source = FakeSource { values: BTreeMap::from([("DATABASE_URL", Ok("postgres://..."))]) };
        let processors: Vec<&dyn Processor> = Vec::new();
        let requests = vec![SecretRequest { key: "DATABASE_URL".to_string(), env_var: "DATABASE_URL".to_string() }];
        let err = SecretsPipeline::fetch_all("job-1", &requests, &source, &processors)
            .await
            .unwrap_err();
        assert!(matches!(err, SecretsError::Unclaimed(_)));
    }
}
