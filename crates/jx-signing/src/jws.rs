// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compact JWS parsing: `header_b64.payload_b64.signature_b64`, split and
//! base64url-decoded without validating anything about the signature
//! itself — that's `verify`'s job.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::SignatureError;

#[derive(Debug, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    pub kid: Option<String>,
}

pub struct ParsedJws {
    pub header: JwsHeader,
    /// `header_b64 + "." + payload_b64`, the exact bytes the signature
    /// covers.
    pub signing_input: Vec<u8>,
    pub signature: Vec<u8>,
    pub payload: serde_json::Value,
}

pub fn parse(token: &str) -> Result<ParsedJws, SignatureError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(SignatureError::Malformed("missing header"))?;
    let payload_b64 = parts.next().ok_or(SignatureError::Malformed("missing payload"))?;
    let signature_b64 = parts.next().ok_or(SignatureError::Malformed("missing signature"))?;
    if parts.next().is_some() {
        return Err(SignatureError::Malformed("too many segments"));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| SignatureError::Malformed("header is not valid base64url"))?;
    let header: JwsHeader = serde_json::from_slice(&header_bytes)
        .map_err(|_| SignatureError::Malformed("header is not valid JSON"))?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| SignatureError::Malformed("payload is not valid base64url"))?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|_| SignatureError::Malformed("payload is not valid JSON"))?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| SignatureError::Malformed("signature is not valid base64url"))?;

    let mut signing_input = Vec::with_capacity(header_b64.len() + payload_b64.len() + 1);
    signing_input.extend_from_slice(header_b64.as_bytes());
    signing_input.push(b'.');
    signing_input.extend_from_slice(payload_b64.as_bytes());

    Ok(ParsedJws { header, signing_input, signature, payload })
}
