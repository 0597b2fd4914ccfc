// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses a job's opaque `verification_key` string as a JSON Web Key Set
//! into usable verifying key material. Only the key types this agent can
//! actually verify against are supported; anything else is a clear
//! configuration error rather than a silent skip.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::algorithm::SignatureAlgorithm;
use crate::error::SignatureError;
use crate::key::{TrustedKey, TrustedKeySet};

#[derive(Debug, Deserialize)]
struct JwkDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    alg: Option<String>,
    crv: Option<String>,
    x: Option<String>,
    y: Option<String>,
    n: Option<String>,
    e: Option<String>,
    k: Option<String>,
}

pub fn parse(raw: &str) -> Result<TrustedKeySet, SignatureError> {
    let doc: JwkDocument =
        serde_json::from_str(raw).map_err(|e| SignatureError::InvalidKeySet(e.to_string()))?;
    let keys = doc.keys.into_iter().map(to_trusted_key).collect::<Result<Vec<_>, _>>()?;
    Ok(TrustedKeySet::new(keys))
}

fn b64(field: &str, value: &Option<String>) -> Result<Vec<u8>, SignatureError> {
    let raw = value
        .as_deref()
        .ok_or_else(|| SignatureError::InvalidKeySet(format!("JWK is missing `{field}`")))?;
    URL_SAFE_NO_PAD
        .decode(raw)
        .map_err(|_| SignatureError::InvalidKeySet(format!("JWK field `{field}` is not valid base64url")))
}

fn field_bytes<'a>(field: &'a str, bytes: &'a [u8], expected_len: usize) -> Result<&'a [u8], SignatureError> {
    if bytes.len() != expected_len {
        return Err(SignatureError::InvalidKeySet(format!(
            "JWK field `{field}` must be {expected_len} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn to_trusted_key(jwk: Jwk) -> Result<TrustedKey, SignatureError> {
    match jwk.kty.as_str() {
        "EC" => match jwk.crv.as_deref() {
            Some("P-256") => {
                let x = b64("x", &jwk.x)?;
                let y = b64("y", &jwk.y)?;
                let point = p256::EncodedPoint::from_affine_coordinates(
                    p256::FieldBytes::from_slice(field_bytes("x", &x, 32)?),
                    p256::FieldBytes::from_slice(field_bytes("y", &y, 32)?),
                    false,
                );
                let key = p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                    .map_err(|_| SignatureError::InvalidKeySet("EC P-256 point is not on the curve".into()))?;
                Ok(TrustedKey::P256 { kid: jwk.kid, key: Box::new(key) })
            }
            Some("P-384") => {
                let x = b64("x", &jwk.x)?;
                let y = b64("y", &jwk.y)?;
                let point = p384::EncodedPoint::from_affine_coordinates(
                    p384::FieldBytes::from_slice(field_bytes("x", &x, 48)?),
                    p384::FieldBytes::from_slice(field_bytes("y", &y, 48)?),
                    false,
                );
                let key = p384::ecdsa::VerifyingKey::from_encoded_point(&point)
                    .map_err(|_| SignatureError::InvalidKeySet("EC P-384 point is not on the curve".into()))?;
                Ok(TrustedKey::P384 { kid: jwk.kid, key: Box::new(key) })
            }
            Some("P-521") => Err(SignatureError::UnsupportedAlgorithm("ES512")),
            other => Err(SignatureError::InvalidKeySet(format!("unsupported EC curve {other:?}"))),
        },
        "oct" => {
            let secret = b64("k", &jwk.k)?;
            let algorithm = jwk
                .alg
                .as_deref()
                .map(SignatureAlgorithm::parse)
                .transpose()?
                .ok_or_else(|| {
                    SignatureError::InvalidKeySet("an `oct` JWK must name its `alg` (HS256/384/512)".into())
                })?;
            Ok(TrustedKey::Hmac { kid: jwk.kid, algorithm, secret })
        }
        "RSA" => {
            let n = b64("n", &jwk.n)?;
            let e = b64("e", &jwk.e)?;
            let algorithm = jwk
                .alg
                .as_deref()
                .map(SignatureAlgorithm::parse)
                .transpose()?
                .ok_or_else(|| {
                    SignatureError::InvalidKeySet("an `RSA` JWK must name its `alg` (PS256/384/512)".into())
                })?;
            let key = rsa::RsaPublicKey::new(
                rsa::BigUint::from_bytes_be(&n),
                rsa::BigUint::from_bytes_be(&e),
            )
            .map_err(|e| SignatureError::InvalidKeySet(format!("invalid RSA key: {e}")))?;
            Ok(TrustedKey::Rsa { kid: jwk.kid, algorithm, key: Box::new(key) })
        }
        "OKP" if jwk.crv.as_deref() == Some("Ed25519") => {
            let x = b64("x", &jwk.x)?;
            let bytes: [u8; 32] = x
                .try_into()
                .map_err(|_| SignatureError::InvalidKeySet("Ed25519 JWK `x` must be 32 bytes".into()))?;
            let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                .map_err(|e| SignatureError::InvalidKeySet(format!("invalid Ed25519 key: {e}")))?;
            Ok(TrustedKey::Ed25519 { kid: jwk.kid, key: Box::new(key) })
        }
        other => Err(SignatureError::InvalidKeySet(format!("unsupported key type {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_hmac_key() {
        let secret = URL_SAFE_NO_PAD.encode(b"super-secret-value");
        let doc = serde_json::json!({"keys": [{"kty": "oct", "alg": "HS256", "kid": "k1", "k": secret}]});
        let set = parse(&doc.to_string()).unwrap();
        assert!(!set.is_empty());
        assert_eq!(set.candidates(SignatureAlgorithm::Hs256, Some("k1")).len(), 1);
    }

    #[test]
    fn rejects_p521_as_unsupported() {
        let doc = serde_json::json!({"keys": [{"kty": "EC", "crv": "P-521", "x": "", "y": ""}]});
        let err = parse(&doc.to_string()).unwrap_err();
        assert!(matches!(err, SignatureError::UnsupportedAlgorithm("ES512")));
    }

    #[test]
    fn rejects_oct_key_with_no_alg() {
        let secret = URL_SAFE_NO_PAD.encode(b"super-secret-value");
        let doc = serde_json::json!({"keys": [{"kty": "oct", "k": secret}]});
        assert!(parse(&doc.to_string()).is_err());
    }
}
