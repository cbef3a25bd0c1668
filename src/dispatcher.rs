use std::collections::BTreeSet;
use std::sync::Arc;

use http::header::HeaderValue;
use http::{HeaderMap, Method};
use reqwest::Url;

use crate::client::{rewrite_url, UpstreamClient};
use crate::config::SharedConfiguration;
use crate::domain::{CapturedContent, ComparisonResult, DiffReport, Interaction, RequestEnvelope};
use crate::exporter;
use crate::json_diff;
use crate::noise::NoiseOperation;
use crate::ProxyError;

/// Orchestrates one comparison: fans the inbound request out to the
/// upstreams, runs noise cancellation when configured, and reduces the
/// responses to a verdict.
pub struct Dispatcher {
    config: SharedConfiguration,
    client: Arc<dyn UpstreamClient>,
}

impl Dispatcher {
    pub fn new(config: SharedConfiguration, client: Arc<dyn UpstreamClient>) -> Self {
        Self { config, client }
    }

    pub async fn compare(
        &self,
        request: &RequestEnvelope,
    ) -> Result<(ComparisonResult, CapturedContent), ProxyError> {
        let config = self.config.snapshot();

        if !config.allow_unsafe_operations && !is_safe_operation(&request.method) {
            tracing::debug!(method = %request.method, "rejected by the safety gate");
            return Err(ProxyError::MethodNotAllowed(format!(
                "unsafe operations are not allowed and {} method has been received",
                request.method
            )));
        }

        tracing::debug!(url = %request.uri, "processing comparison");

        let primary_url =
            rewrite_url(&config.primary, &request.uri).map_err(ProxyError::ConfigInvalid)?;
        let candidate_url =
            rewrite_url(&config.candidate, &request.uri).map_err(ProxyError::ConfigInvalid)?;

        let (primary, candidate, secondary) = if config.noise_detection {
            let secondary_url =
                rewrite_url(&config.secondary, &request.uri).map_err(ProxyError::ConfigInvalid)?;
            let (primary, candidate, secondary) = tokio::join!(
                self.client.make_request(request, &primary_url),
                self.client.make_request(request, &candidate_url),
                self.client.make_request(request, &secondary_url),
            );
            (
                checked("primary", &primary_url, primary)?,
                checked("candidate", &candidate_url, candidate)?,
                Some(checked("secondary", &secondary_url, secondary)?),
            )
        } else {
            let (primary, candidate) = tokio::join!(
                self.client.make_request(request, &primary_url),
                self.client.make_request(request, &candidate_url),
            );
            (
                checked("primary", &primary_url, primary)?,
                checked("candidate", &candidate_url, candidate)?,
                None,
            )
        };

        let mut diff = DiffReport::default();
        if primary.status != candidate.status {
            diff.status_diff = format!(
                "{} vs {}",
                primary.status.as_u16(),
                candidate.status.as_u16()
            );
        }

        let (primary_body, candidate_body) = match &secondary {
            Some(secondary) => {
                if primary.status != secondary.status {
                    tracing::error!(
                        primary_status = primary.status.as_u16(),
                        secondary_status = secondary.status.as_u16(),
                        "baselines disagree on the status code"
                    );
                    return Err(ProxyError::NoisePrecondition(format!(
                        "status code between primary ({}: {}) and secondary ({}: {}) are different",
                        primary.url,
                        primary.status.as_u16(),
                        secondary.url,
                        secondary.status.as_u16()
                    )));
                }
                let mut noise = NoiseOperation::new();
                noise
                    .detect(&primary.body, &secondary.body)
                    .map_err(ProxyError::NoisePrecondition)?;
                noise
                    .overlay(&config.ignore_values)
                    .map_err(ProxyError::ConfigInvalid)?;
                noise
                    .remove(&primary.body, &candidate.body)
                    .map_err(ProxyError::NoisePrecondition)?
            }
            None => (primary.body.clone(), candidate.body.clone()),
        };

        diff.body_diff = json_diff::describe_differences(
            &primary_body,
            &candidate_body,
            config.difference_mode,
        );
        if config.headers {
            diff.header_diff = diff_headers(&primary.headers, &candidate.headers);
        }

        let equal_content = diff.is_empty();

        if config.is_store_results_set() {
            let record = exporter::create_interactions(
                &primary,
                &candidate,
                secondary.as_ref(),
                config.difference_mode,
                equal_content,
            );
            if let Err(error) = exporter::export_to_file(&config.store_results, &record) {
                tracing::error!(
                    error = %error,
                    path = %config.store_results,
                    "failed to store comparison results"
                );
            }
        }

        tracing::debug!(
            primary = %primary_url,
            candidate = %candidate_url,
            equal = equal_content,
            "comparison finished"
        );

        let result = ComparisonResult {
            equal_content,
            diff,
            primary_elapsed_time: primary.elapsed,
            candidate_elapsed_time: candidate.elapsed,
            secondary_elapsed_time: secondary
                .as_ref()
                .map(|s| s.elapsed)
                .unwrap_or_default(),
        };
        let captured = CapturedContent {
            content: primary.body,
        };
        Ok((result, captured))
    }
}

fn is_safe_operation(method: &Method) -> bool {
    *method == Method::GET || *method == Method::OPTIONS || *method == Method::HEAD
}

fn checked(
    upstream: &str,
    url: &Url,
    result: Result<Interaction, String>,
) -> Result<Interaction, ProxyError> {
    result.map_err(|error| {
        tracing::error!(upstream = upstream, url = %url, error = %error, "upstream call failed");
        ProxyError::UpstreamUnavailable(format!(
            "error while connecting to {} site ({}) with {}",
            upstream, url, error
        ))
    })
}

/// Header comparison: names case-insensitively (already lower-cased in the
/// map), value lists byte-exact and order-sensitive.
fn diff_headers(primary: &HeaderMap, candidate: &HeaderMap) -> String {
    let names = primary
        .keys()
        .chain(candidate.keys())
        .map(|name| name.as_str())
        .collect::<BTreeSet<_>>();

    let mut lines = vec![];
    for name in names {
        let primary_values = primary
            .get_all(name)
            .iter()
            .map(HeaderValue::as_bytes)
            .collect::<Vec<_>>();
        let candidate_values = candidate
            .get_all(name)
            .iter()
            .map(HeaderValue::as_bytes)
            .collect::<Vec<_>>();
        if primary_values != candidate_values {
            lines.push(format!(
                "header {}: [{}] vs [{}]",
                name,
                printable(&primary_values),
                printable(&candidate_values)
            ));
        }
    }
    lines.join("\n")
}

fn printable(values: &[&[u8]]) -> String {
    values
        .iter()
        .map(|value| String::from_utf8_lossy(value).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
