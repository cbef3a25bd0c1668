// Copyright 2025 The Contrast Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

use std::fmt;

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod exporter;
pub mod json_diff;
pub mod noise;
pub mod server;

pub use client::{HttpUpstreamClient, UpstreamClient};
pub use config::{Configuration, ConfigurationUpdate, SharedConfiguration, TlsOptions};
pub use dispatcher::Dispatcher;
pub use domain::{CapturedContent, ComparisonResult, DiffReport, Interaction, RequestEnvelope};
pub use json_diff::DiffMode;
pub use server::start_proxy;

/// Error surfaced by a comparison run or a configuration change.
///
/// The embedding HTTP facade translates each kind into a status code; the
/// carried string is the message returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// The safety gate rejected a non-idempotent method.
    MethodNotAllowed(String),
    /// An upstream call failed or its body could not be read.
    UpstreamUnavailable(String),
    /// Noise detection was requested but its preconditions do not hold.
    NoisePrecondition(String),
    /// A configuration field could not be parsed.
    ConfigInvalid(String),
    /// Anything else.
    Internal(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::MethodNotAllowed(msg)
            | ProxyError::UpstreamUnavailable(msg)
            | ProxyError::NoisePrecondition(msg)
            | ProxyError::ConfigInvalid(msg)
            | ProxyError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ProxyError {}
