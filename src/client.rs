use std::fs;
use std::time::Instant;

use async_trait::async_trait;
use http::{header, Uri};
use reqwest::{Certificate, Identity, Url};

use crate::config::TlsOptions;
use crate::domain::{Interaction, RequestEnvelope};
use crate::ProxyError;

/// The single operation the dispatcher needs from an HTTP client. Narrow on
/// purpose: tests drive the dispatcher with recorded responses instead of a
/// network, and fan-out stays the dispatcher's responsibility.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Replays the inbound request against `url`, preserving method, headers
    /// and body, and returns the full response with its elapsed time.
    async fn make_request(
        &self,
        request: &RequestEnvelope,
        url: &Url,
    ) -> Result<Interaction, String>;
}

/// Rewrites the inbound request URL against an upstream base: scheme, host,
/// port and base path come from the upstream, path and query from the
/// inbound request.
pub fn rewrite_url(base: &str, inbound: &Uri) -> Result<Url, String> {
    let mut url =
        Url::parse(base).map_err(|e| format!("invalid upstream base {}: {}", base, e))?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), inbound.path());
    url.set_path(&path);
    url.set_query(inbound.query());
    Ok(url)
}

/// `reqwest`-backed client. TLS material is applied once at construction and
/// immutable afterwards.
pub struct HttpUpstreamClient {
    client: reqwest::Client,
}

impl HttpUpstreamClient {
    pub fn new(tls: &TlsOptions) -> Result<Self, ProxyError> {
        let mut builder = reqwest::Client::builder().use_rustls_tls();

        if tls.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca_cert) = &tls.ca_cert {
            let pem = fs::read(ca_cert).map_err(|e| {
                ProxyError::ConfigInvalid(format!("cannot read CA cert {}: {}", ca_cert.display(), e))
            })?;
            let certificate = Certificate::from_pem(&pem)
                .map_err(|e| ProxyError::ConfigInvalid(format!("invalid CA cert: {}", e)))?;
            builder = builder.add_root_certificate(certificate);
        }
        if let (Some(client_cert), Some(client_key)) = (&tls.client_cert, &tls.client_key) {
            let mut pem = fs::read(client_cert).map_err(|e| {
                ProxyError::ConfigInvalid(format!(
                    "cannot read client cert {}: {}",
                    client_cert.display(),
                    e
                ))
            })?;
            pem.extend(fs::read(client_key).map_err(|e| {
                ProxyError::ConfigInvalid(format!(
                    "cannot read client key {}: {}",
                    client_key.display(),
                    e
                ))
            })?);
            let identity = Identity::from_pem(&pem)
                .map_err(|e| ProxyError::ConfigInvalid(format!("invalid client identity: {}", e)))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| ProxyError::Internal(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn make_request(
        &self,
        request: &RequestEnvelope,
        url: &Url,
    ) -> Result<Interaction, String> {
        // The connection-level headers belong to the hop, not the request.
        let mut headers = request.headers.clone();
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let started = Instant::now();
        let response = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| e.to_string())?.to_vec();

        Ok(Interaction {
            url: url.clone(),
            body,
            status,
            headers,
            elapsed: started.elapsed(),
        })
    }
}
