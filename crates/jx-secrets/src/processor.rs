// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Processor` capability and the two narrow sinks the built-in
//! env-var processor needs. Kept separate from `jx-shell`/`jx-redact` so
//! this crate stays testable with plain in-memory doubles — the engine
//! wires the real `Shell`/`Redactor` in by implementing these traits for
//! them (or a thin adapter around them).

use jx_core::SecretRequest;

use crate::error::SecretsError;

/// A handler capable of claiming and processing some subset of secret
/// requests, per `spec.md` §4.9: "each secret is handed to the first
/// processor claiming support for it".
pub trait Processor: Send + Sync {
    fn supports(&self, request: &SecretRequest) -> bool;
    fn process(&self, request: &SecretRequest, value: &str) -> Result<(), SecretsError>;
}

/// Where the env-var processor writes a secret's value.
pub trait EnvSink: Send + Sync {
    fn set_env(&self, key: &str, value: &str);
}

/// Where the env-var processor registers a secret value for redaction.
pub trait NeedleSink: Send + Sync {
    fn add_needle(&self, needle: &str) -> bool;
}

/// The one processor named in `spec.md`: writes the secret to the Shell
/// env under its requested name and registers the value with the
/// Redacting Streamer so it never reaches the log un-redacted.
pub struct EnvVarProcessor<'a> {
    env: &'a dyn EnvSink,
    needles: &'a dyn NeedleSink,
}

impl<'a> EnvVarProcessor<'a> {
    pub fn new(env: &'a dyn EnvSink, needles: &'a dyn NeedleSink) -> Self {
        Self { env, needles }
    }
}

impl Processor for EnvVarProcessor<'_> {
    fn supports(&self, _request: &SecretRequest) -> bool {
        // The env-var processor is the universal fallback: every
        // request names an `env_var`, so it claims everything.
        true
    }

    fn process(&self, request: &SecretRequest, value: &str) -> Result<(), SecretsError> {
        self.env.set_env(&request.env_var, value);
        if !self.needles.add_needle(value) {
            tracing::warn!(
                env_var = %request.env_var,
                "secret value shorter than the redaction minimum; exported but not redactable"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct FakeEnv(Mutex<BTreeMap<String, String>>);
    impl EnvSink for FakeEnv {
        fn set_env(&self, key: &str, value: &str) {
            self.0.lock().insert(key.to_string(), value.to_string());
        }
    }

    #[derive(Default)]
    struct FakeNeedles(Mutex<Vec<String>>);
    impl NeedleSink for FakeNeedles {
        fn add_needle(&self, needle: &str) -> bool {
            if needle.len() < 6 {
                return false;
            }
            self.0.lock().push(needle.to_string());
            true
        }
    }

    #[test]
    fn writes_env_and_registers_needle() {
        let env = FakeEnv::default();
        let needles = FakeNeedles::default();
        let processor = EnvVarProcessor::new(&env, &needles);
        let req = SecretRequest { key: "db".to_string(), env_var: "DATABASE_URL".to_string() };
        processor.process(&req, "super-secret-value").unwrap();
        assert_eq!(env.0.lock().get("DATABASE_URL"), Some(&"super-secret-value".to_string()));
        assert_eq!(needles.0.lock().as_slice(), ["super-secret-value"]);
    }

    #[test]
    fn short_value_is_exported_but_not_redacted() {
        let env = FakeEnv::default();
        let needles = FakeNeedles::default();
        let processor = EnvVarProcessor::new(&env, &needles);
        let req = SecretRequest { key: "k".to_string(), env_var: "SHORT".to_string() };
        processor.process(&req, "abc").unwrap();
        assert_eq!(env.0.lock().get("SHORT"), Some(&"abc".to_string()));
        assert!(needles.0.lock().is_empty());
    }
}
