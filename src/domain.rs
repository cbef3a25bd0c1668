use std::time::Duration;

use http::{HeaderMap, Method, Uri};
use reqwest::Url;

/// An inbound request, frozen as received from the calling client.
///
/// The dispatcher never mutates it; the only transformation applied on its
/// way to an upstream is the scheme/host/port rewrite against the upstream
/// base URL.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RequestEnvelope {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }
}

/// One upstream's answer: the URL that was called, the full body, the status
/// code, the response headers and the wall-clock time the call took.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub url: Url,
    pub body: Vec<u8>,
    pub status: http::StatusCode,
    pub headers: HeaderMap,
    pub elapsed: Duration,
}

/// Differences found on each comparison axis. An empty string means the axis
/// did not diverge (or was not compared).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub body_diff: String,
    pub status_diff: String,
    pub header_diff: String,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.body_diff.is_empty() && self.status_diff.is_empty() && self.header_diff.is_empty()
    }
}

/// The outcome of one comparison.
///
/// `equal_content` holds exactly when every compared axis in `diff` is empty.
/// The elapsed times are carried for observability; they never influence the
/// verdict. `secondary_elapsed_time` is zero when noise detection was off.
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub equal_content: bool,
    pub diff: DiffReport,
    pub primary_elapsed_time: Duration,
    pub candidate_elapsed_time: Duration,
    pub secondary_elapsed_time: Duration,
}

/// The primary response body, handed back so a mirroring caller can stream
/// the baseline behaviour to its own client.
#[derive(Debug, Clone)]
pub struct CapturedContent {
    pub content: Vec<u8>,
}
