// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jx-secrets: the Secrets Pipeline. Fetches a job's named secrets from
//! the controller all-or-nothing, then hands each to the first
//! `Processor` claiming it.

mod error;
mod pipeline;
mod processor;

pub use error::{FailedSecret, SecretsError};
pub use pipeline::{SecretSource, SecretsPipeline};
pub use processor::{EnvSink, EnvVarProcessor, NeedleSink, Processor};
