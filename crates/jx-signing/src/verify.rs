// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-algorithm signature verification. Each branch is a thin adapter
//! over one RustCrypto crate; none of them parse the token itself — that's
//! `jws::parse`'s job.

use hmac::{Hmac, Mac};
use p256::ecdsa::signature::Verifier as _;
use rsa::signature::Verifier as _;
use sha2::{Sha256, Sha384, Sha512};

use crate::algorithm::SignatureAlgorithm;
use crate::error::SignatureError;
use crate::jws::ParsedJws;
use crate::key::{TrustedKey, TrustedKeySet};

/// Verifies `jws` against the first candidate key in `keys` that matches
/// its algorithm and key id. Returns the decoded payload on success.
pub fn verify(jws: &ParsedJws, keys: &TrustedKeySet) -> Result<serde_json::Value, SignatureError> {
    let algorithm = SignatureAlgorithm::parse(&jws.header.alg)?;
    if algorithm == SignatureAlgorithm::Es512 {
        return Err(SignatureError::UnsupportedAlgorithm("ES512"));
    }

    let candidates = keys.candidates(algorithm, jws.header.kid.as_deref());
    if candidates.is_empty() {
        return Err(SignatureError::NoMatchingKey {
            algorithm: algorithm.as_str(),
            kid: jws.header.kid.clone(),
        });
    }

    for key in candidates {
        if verify_with_key(jws, key).is_ok() {
            return Ok(jws.payload.clone());
        }
    }
    Err(SignatureError::VerificationFailed)
}

fn verify_with_key(jws: &ParsedJws, key: &TrustedKey) -> Result<(), SignatureError> {
    match key {
        TrustedKey::P256 { key, .. } => {
            let signature = p256::ecdsa::Signature::try_from(jws.signature.as_slice())
                .map_err(|_| SignatureError::Malformed("ECDSA signature is not the expected length"))?;
            key.verify(&jws.signing_input, &signature).map_err(|_| SignatureError::VerificationFailed)
        }
        TrustedKey::P384 { key, .. } => {
            let signature = p384::ecdsa::Signature::try_from(jws.signature.as_slice())
                .map_err(|_| SignatureError::Malformed("ECDSA signature is not the expected length"))?;
            key.verify(&jws.signing_input, &signature).map_err(|_| SignatureError::VerificationFailed)
        }
        TrustedKey::Hmac { algorithm, secret, .. } => verify_hmac(*algorithm, secret, jws),
        TrustedKey::Rsa { algorithm, key, .. } => verify_rsa_pss(*algorithm, key, jws),
        TrustedKey::Ed25519 { key, .. } => {
            let bytes: [u8; 64] = jws
                .signature
                .as_slice()
                .try_into()
                .map_err(|_| SignatureError::Malformed("EdDSA signature must be 64 bytes"))?;
            let signature = ed25519_dalek::Signature::from_bytes(&bytes);
            key.verify_strict(&jws.signing_input, &signature)
                .map_err(|_| SignatureError::VerificationFailed)
        }
    }
}

fn verify_hmac(algorithm: SignatureAlgorithm, secret: &[u8], jws: &ParsedJws) -> Result<(), SignatureError> {
    macro_rules! hmac_verify {
        ($hash:ty) => {{
            let mut mac = Hmac::<$hash>::new_from_slice(secret).map_err(|_| SignatureError::VerificationFailed)?;
            mac.update(&jws.signing_input);
            mac.verify_slice(&jws.signature).map_err(|_| SignatureError::VerificationFailed)
        }};
    }

    match algorithm {
        SignatureAlgorithm::Hs256 => hmac_verify!(Sha256),
        SignatureAlgorithm::Hs384 => hmac_verify!(Sha384),
        SignatureAlgorithm::Hs512 => hmac_verify!(Sha512),
        _ => unreachable!("verify_hmac is only called for HS* algorithms"),
    }
}

fn verify_rsa_pss(
    algorithm: SignatureAlgorithm,
    key: &rsa::RsaPublicKey,
    jws: &ParsedJws,
) -> Result<(), SignatureError> {
    macro_rules! pss {
        ($hash:ty) => {{
            let verifying_key = rsa::pss::VerifyingKey::<$hash>::new(key.clone());
            let signature = rsa::pss::Signature::try_from(jws.signature.as_slice())
                .map_err(|_| SignatureError::Malformed("PSS signature is malformed"))?;
            verifying_key
                .verify(&jws.signing_input, &signature)
                .map_err(|_| SignatureError::VerificationFailed)
        }};
    }

    match algorithm {
        SignatureAlgorithm::Ps256 => pss!(Sha256),
        SignatureAlgorithm::Ps384 => pss!(Sha384),
        SignatureAlgorithm::Ps512 => pss!(Sha512),
        _ => unreachable!("verify_rsa_pss is only called for PS* algorithms"),
    }
}
