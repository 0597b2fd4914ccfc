// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::algorithm::SignatureAlgorithm;
use crate::error::SignatureError;

#[derive(Debug)]
pub enum TrustedKey {
    P256 { kid: Option<String>, key: Box<p256::ecdsa::VerifyingKey> },
    P384 { kid: Option<String>, key: Box<p384::ecdsa::VerifyingKey> },
    Hmac { kid: Option<String>, algorithm: SignatureAlgorithm, secret: Vec<u8> },
    Rsa { kid: Option<String>, algorithm: SignatureAlgorithm, key: Box<rsa::RsaPublicKey> },
    Ed25519 { kid: Option<String>, key: Box<ed25519_dalek::VerifyingKey> },
}

impl TrustedKey {
    fn kid(&self) -> Option<&str> {
        match self {
            Self::P256 { kid, .. } => kid.as_deref(),
            Self::P384 { kid, .. } => kid.as_deref(),
            Self::Hmac { kid, .. } => kid.as_deref(),
            Self::Rsa { kid, .. } => kid.as_deref(),
            Self::Ed25519 { kid, .. } => kid.as_deref(),
        }
    }

    fn matches_algorithm(&self, algorithm: SignatureAlgorithm) -> bool {
        use SignatureAlgorithm::*;
        match self {
            Self::P256 { .. } => algorithm == Es256,
            Self::P384 { .. } => algorithm == Es384,
            Self::Hmac { algorithm: a, .. } => *a == algorithm,
            Self::Rsa { algorithm: a, .. } => *a == algorithm,
            Self::Ed25519 { .. } => algorithm == EdDsa,
        }
    }
}

/// The full set of keys an agent trusts, as resolved from job configuration.
#[derive(Debug)]
pub struct TrustedKeySet {
    keys: Vec<TrustedKey>,
}

impl TrustedKeySet {
    pub fn new(keys: Vec<TrustedKey>) -> Self {
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Finds a key matching `algorithm`, narrowed by `kid` when the token
    /// names one. A `kid`-less token matches any key of the right
    /// algorithm; ambiguity between several same-algorithm keys is
    /// resolved by trying the first that verifies (handled by the caller).
    pub fn candidates(&self, algorithm: SignatureAlgorithm, kid: Option<&str>) -> Vec<&TrustedKey> {
        self.keys
            .iter()
            .filter(|k| k.matches_algorithm(algorithm))
            .filter(|k| match kid {
                Some(requested) => k.kid() == Some(requested),
                None => true,
            })
            .collect()
    }
}
