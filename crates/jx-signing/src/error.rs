// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("malformed signature token: {0}")]
    Malformed(&'static str),

    #[error("signature algorithm {0:?} is not recognized")]
    UnknownAlgorithm(String),

    #[error("algorithm {0} is not supported by this agent (no usable key implementation)")]
    UnsupportedAlgorithm(&'static str),

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("no trusted key matches algorithm {algorithm} and key id {kid:?}")]
    NoMatchingKey { algorithm: &'static str, kid: Option<String> },

    #[error("trusted key set is malformed: {0}")]
    InvalidKeySet(String),

    #[error(
        "signed field {field:?} disagrees with the job environment: signed={signed:?} actual={actual:?}"
    )]
    FieldMismatch { field: String, signed: String, actual: String },

    #[error("a signature is present but no trusted key is configured")]
    NoTrustedKeyConfigured,

    #[error("step has no signature")]
    MissingSignature,
}
