// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The policy layer: turns a raw verify outcome into block/warn/approve,
//! and separately enforces the two checks that are fatal no matter what
//! the policy says (a signed field disagreeing with reality, or a
//! signature with no trusted key to check it against).

use std::collections::BTreeMap;

use jx_core::config::{SignaturePolicy, SigningPolicy};

use crate::error::SignatureError;
use crate::jwkset;
use crate::jws;
use crate::key::TrustedKeySet;
use crate::verify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Approved,
    /// Policy allowed the step through despite a problem; carries the
    /// warning text for the caller to log.
    Warned(String),
}

pub struct SignatureGate {
    policy: SigningPolicy,
    keys: Option<TrustedKeySet>,
}

impl SignatureGate {
    pub fn new(policy: SigningPolicy, verification_key: Option<&str>) -> Result<Self, SignatureError> {
        let keys = verification_key.map(jwkset::parse).transpose()?;
        Ok(Self { policy, keys })
    }

    /// `signature` is the step's raw JWS compact token, if any.
    /// `actual_fields` maps signed-field names (e.g. `"command"`) to the
    /// job's actual environment value for that field.
    pub fn check(
        &self,
        signature: Option<&str>,
        actual_fields: &BTreeMap<String, String>,
    ) -> Result<GateOutcome, SignatureError> {
        let token = match signature {
            Some(t) => t,
            None => {
                return match self.policy.missing_signature {
                    SignaturePolicy::Warn => {
                        let reason = "no signature present on step".to_string();
                        tracing::warn!(%reason, "signature gate: proceeding under warn policy");
                        Ok(GateOutcome::Warned(reason))
                    }
                    SignaturePolicy::Block => Err(SignatureError::MissingSignature),
                };
            }
        };

        let parsed = jws::parse(token)?;

        // A present signature with no trusted key to check it against is
        // fatal regardless of policy: controller-supplied keys are never
        // trusted implicitly.
        let keys = match &self.keys {
            Some(keys) if !keys.is_empty() => keys,
            _ => return Err(SignatureError::NoTrustedKeyConfigured),
        };

        let payload = match verify::verify(&parsed, keys) {
            Ok(payload) => payload,
            Err(err) => {
                return match self.policy.invalid_signature {
                    SignaturePolicy::Warn => {
                        let reason = format!("signature did not verify: {err}");
                        tracing::warn!(%reason, "signature gate: proceeding under warn policy");
                        Ok(GateOutcome::Warned(reason))
                    }
                    SignaturePolicy::Block => Err(err),
                };
            }
        };

        for (field, actual) in actual_fields {
            if let Some(signed) = payload.get(field).and_then(|v| v.as_str()) {
                if signed != actual {
                    return Err(SignatureError::FieldMismatch {
                        field: field.clone(),
                        signed: signed.to_string(),
                        actual: actual.clone(),
                    });
                }
            }
        }

        Ok(GateOutcome::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed_token(signing_key: &SigningKey, kid: &str, payload: &serde_json::Value) -> String {
        let header = serde_json::json!({"alg": "EdDSA", "kid": kid});
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        let signing_input = format!("{header_b64}.{payload_b64}");
        let signature = signing_key.sign(signing_input.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());
        format!("{signing_input}.{signature_b64}")
    }

    fn jwk_set_for(signing_key: &SigningKey, kid: &str) -> String {
        let x = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());
        serde_json::json!({"keys": [{"kty": "OKP", "crv": "Ed25519", "kid": kid, "x": x}]}).to_string()
    }

    fn block_policy() -> SigningPolicy {
        SigningPolicy { missing_signature: SignaturePolicy::Block, invalid_signature: SignaturePolicy::Block }
    }

    fn warn_policy() -> SigningPolicy {
        SigningPolicy { missing_signature: SignaturePolicy::Warn, invalid_signature: SignaturePolicy::Warn }
    }

    #[test]
    fn missing_signature_blocks_under_block_policy() {
        let gate = SignatureGate::new(block_policy(), None).unwrap();
        let err = gate.check(None, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, SignatureError::MissingSignature));
    }

    #[test]
    fn missing_signature_warns_under_warn_policy() {
        let gate = SignatureGate::new(warn_policy(), None).unwrap();
        let outcome = gate.check(None, &BTreeMap::new()).unwrap();
        assert!(matches!(outcome, GateOutcome::Warned(_)));
    }

    #[test]
    fn valid_signature_with_matching_fields_is_approved() {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let jwk_set = jwk_set_for(&signing_key, "k1");
        let gate = SignatureGate::new(block_policy(), Some(&jwk_set)).unwrap();

        let token = signed_token(&signing_key, "k1", &serde_json::json!({"command": "echo hi"}));
        let mut fields = BTreeMap::new();
        fields.insert("command".to_string(), "echo hi".to_string());

        let outcome = gate.check(Some(&token), &fields).unwrap();
        assert_eq!(outcome, GateOutcome::Approved);
    }

    #[test]
    fn signed_field_disagreeing_with_environment_is_fatal_even_under_warn_policy() {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let jwk_set = jwk_set_for(&signing_key, "k1");
        let gate = SignatureGate::new(warn_policy(), Some(&jwk_set)).unwrap();

        let token = signed_token(&signing_key, "k1", &serde_json::json!({"command": "echo hi"}));
        let mut fields = BTreeMap::new();
        fields.insert("command".to_string(), "rm -rf /".to_string());

        let err = gate.check(Some(&token), &fields).unwrap_err();
        assert!(matches!(err, SignatureError::FieldMismatch { .. }));
    }

    #[test]
    fn signature_present_with_no_trusted_key_is_fatal_even_under_warn_policy() {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let gate = SignatureGate::new(warn_policy(), None).unwrap();

        let token = signed_token(&signing_key, "k1", &serde_json::json!({"command": "echo hi"}));
        let err = gate.check(Some(&token), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, SignatureError::NoTrustedKeyConfigured));
    }

    #[test]
    fn invalid_signature_blocks_under_block_policy() {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let other_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let jwk_set = jwk_set_for(&signing_key, "k1");
        let gate = SignatureGate::new(block_policy(), Some(&jwk_set)).unwrap();

        // Signed by a key that isn't in the trusted set.
        let token = signed_token(&other_key, "k1", &serde_json::json!({"command": "echo hi"}));
        let err = gate.check(Some(&token), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, SignatureError::VerificationFailed));
    }
}
