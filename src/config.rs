use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::json_diff::pointer::Pattern;
use crate::json_diff::DiffMode;
use crate::noise;
use crate::ProxyError;

/// TLS material for the upstream connections, fixed at startup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TlsOptions {
    pub insecure_skip_verify: bool,
    pub ca_cert: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
}

/// Everything the proxy needs to run one comparison.
///
/// Owned by the proxy instance and snapshotted per request; mutations go
/// through [`SharedConfiguration::update`] so no request observes a
/// half-applied patch.
#[derive(Debug, Clone, Serialize)]
pub struct Configuration {
    pub port: u16,
    pub primary: String,
    pub secondary: String,
    pub candidate: String,
    /// File the comparison records are appended to; empty disables storage.
    pub store_results: String,
    pub difference_mode: DiffMode,
    pub noise_detection: bool,
    pub allow_unsafe_operations: bool,
    /// Compare response headers as well.
    pub headers: bool,
    /// Manual noise patterns, RFC 6901 pointers with an optional trailing
    /// `/*`.
    pub ignore_values: Vec<String>,
    pub ignore_values_file: String,
    pub tls: TlsOptions,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            port: 8080,
            primary: String::new(),
            secondary: String::new(),
            candidate: String::new(),
            store_results: String::new(),
            difference_mode: DiffMode::Strict,
            noise_detection: false,
            allow_unsafe_operations: false,
            headers: false,
            ignore_values: vec![],
            ignore_values_file: String::new(),
            tls: TlsOptions::default(),
        }
    }
}

impl Configuration {
    pub fn is_store_results_set(&self) -> bool {
        !self.store_results.is_empty()
    }

    /// Host portion of the primary base URL.
    pub fn service_name(&self) -> String {
        Url::parse(&self.primary)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    /// Reads `ignore_values_file` once and merges its patterns into
    /// `ignore_values`. Called at startup, before the configuration goes
    /// live.
    pub fn load_ignore_values_file(&mut self) -> Result<(), ProxyError> {
        if self.ignore_values_file.is_empty() {
            return Ok(());
        }
        let patterns = noise::load_manual_noise(&self.ignore_values_file)
            .map_err(ProxyError::ConfigInvalid)?;
        self.ignore_values.extend(patterns);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ProxyError> {
        parse_upstream(&self.primary, "primary")?;
        parse_upstream(&self.candidate, "candidate")?;
        if self.noise_detection {
            parse_upstream(&self.secondary, "secondary")?;
        }
        for raw in &self.ignore_values {
            Pattern::parse(raw).map_err(ProxyError::ConfigInvalid)?;
        }
        Ok(())
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "port: {}", self.port)?;
        writeln!(f, "primary: {}", self.primary)?;
        writeln!(f, "secondary: {}", self.secondary)?;
        writeln!(f, "candidate: {}", self.candidate)?;
        writeln!(f, "store results: {}", self.store_results)?;
        writeln!(f, "difference mode: {}", self.difference_mode)?;
        writeln!(f, "noise detection: {}", self.noise_detection)?;
        writeln!(
            f,
            "allow unsafe operations: {}",
            self.allow_unsafe_operations
        )?;
        write!(f, "compare headers: {}", self.headers)
    }
}

/// A runtime patch: every field is a string exactly as it arrived from the
/// admin surface, parsed before anything is applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigurationUpdate {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub candidate: Option<String>,
    pub mode: Option<String>,
    pub noise_detection: Option<String>,
    pub store_results: Option<String>,
    pub headers: Option<String>,
    pub allow_unsafe_operations: Option<String>,
    /// Comma-separated list of pointer patterns.
    pub ignore_values: Option<String>,
}

impl ConfigurationUpdate {
    /// Parses every present field and, only when all of them parse, applies
    /// them to `config`. On any failure `config` is left untouched.
    fn apply(&self, config: &mut Configuration) -> Result<(), ProxyError> {
        let mode = self
            .mode
            .as_deref()
            .map(DiffMode::from_str)
            .transpose()
            .map_err(ProxyError::ConfigInvalid)?;
        let noise_detection = parse_bool(&self.noise_detection, "noiseDetection")?;
        let headers = parse_bool(&self.headers, "headers")?;
        let allow_unsafe_operations =
            parse_bool(&self.allow_unsafe_operations, "allowUnsafeOperations")?;

        for (field, url) in [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("candidate", &self.candidate),
        ] {
            if let Some(url) = url {
                parse_upstream(url, field)?;
            }
        }

        let ignore_values = match &self.ignore_values {
            Some(raw) => {
                let patterns: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect();
                for pattern in &patterns {
                    Pattern::parse(pattern).map_err(ProxyError::ConfigInvalid)?;
                }
                Some(patterns)
            }
            None => None,
        };

        if let Some(primary) = &self.primary {
            config.primary = primary.clone();
        }
        if let Some(secondary) = &self.secondary {
            config.secondary = secondary.clone();
        }
        if let Some(candidate) = &self.candidate {
            config.candidate = candidate.clone();
        }
        if let Some(store_results) = &self.store_results {
            config.store_results = store_results.clone();
        }
        if let Some(mode) = mode {
            config.difference_mode = mode;
        }
        if let Some(noise_detection) = noise_detection {
            config.noise_detection = noise_detection;
        }
        if let Some(headers) = headers {
            config.headers = headers;
        }
        if let Some(allow_unsafe_operations) = allow_unsafe_operations {
            config.allow_unsafe_operations = allow_unsafe_operations;
        }
        if let Some(ignore_values) = ignore_values {
            config.ignore_values = ignore_values;
        }

        Ok(())
    }
}

/// The live configuration: read on every request, replaced wholesale by the
/// admin surface. Readers take a cheap `Arc` snapshot; writers validate the
/// full patch under the lock before publishing.
#[derive(Debug, Clone)]
pub struct SharedConfiguration {
    inner: Arc<RwLock<Arc<Configuration>>>,
}

impl SharedConfiguration {
    pub fn new(config: Configuration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<Configuration> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, patch: &ConfigurationUpdate) -> Result<(), ProxyError> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut staged = (**guard).clone();
        patch.apply(&mut staged)?;
        *guard = Arc::new(staged);
        Ok(())
    }
}

fn parse_upstream(url: &str, field: &str) -> Result<Url, ProxyError> {
    Url::parse(url)
        .map_err(|e| ProxyError::ConfigInvalid(format!("invalid {} base URL {:?}: {}", field, url, e)))
}

fn parse_bool(value: &Option<String>, field: &str) -> Result<Option<bool>, ProxyError> {
    match value {
        Some(raw) => raw
            .parse::<bool>()
            .map(Some)
            .map_err(|_| {
                ProxyError::ConfigInvalid(format!(
                    "{} must be \"true\" or \"false\", got {:?}",
                    field, raw
                ))
            }),
        None => Ok(None),
    }
}
