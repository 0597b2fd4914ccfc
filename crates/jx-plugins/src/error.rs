// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("failed to clone plugin {location}: {message}")]
    CloneFailed { location: String, message: String },

    #[error("failed to check out {version} for plugin {location}: {message}")]
    CheckoutFailed { location: String, version: String, message: String },

    #[error("timed out acquiring lock for plugin {0}")]
    LockTimeout(String),

    #[error("plugin {plugin} configuration failed validation: {offending}")]
    ValidationFailed { plugin: String, offending: serde_json::Value },

    #[error("vendored plugin path {0} escapes the checkout root")]
    VendoredPathEscapesCheckout(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
