//! Reachability probing
//!
//! A probe answers "would the relay get bytes from this URL right now?"
//! without downloading the stream: a HEAD request first, then a streaming
//! GET that reads a single chunk of at most ten transport-stream packets.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONNECTION, CONTENT_TYPE, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Response, redirect};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::utils::url::UrlUtils;

/// MPEG-TS packet size
pub const TS_PACKET_SIZE: usize = 188;

/// Upper bound on the bytes a GET probe inspects
pub const PROBE_CHUNK_SIZE: usize = TS_PACKET_SIZE * 10;

/// Content-type fragments that identify streaming media. Advisory only.
const STREAM_CONTENT_TYPES: &[&str] = &[
    "video/",
    "audio/",
    "mpegurl",
    "octet-stream",
    "mp2t",
    "mp4",
    "mpeg",
    "dash+xml",
    "application/mp4",
    "application/mpeg",
    "application/x-mpegurl",
    "application/vnd.apple.mpegurl",
    "application/ogg",
    "m3u",
    "playlist",
    "binary/",
    "rtsp",
    "rtmp",
    "hls",
    "ts",
];

/// Whether a Content-Type header looks like streaming media
pub fn is_stream_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    STREAM_CONTENT_TYPES
        .iter()
        .any(|fragment| lower.contains(fragment))
}

/// How a probe ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Valid,
    InvalidStatus(u16),
    EmptyBody,
    Timeout,
    TooManyRedirects,
    RequestError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl From<&ProbeConfig> for ProbeTimeouts {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            connect: config.connect_timeout,
            read: config.read_timeout,
        }
    }
}

/// Normalised probe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub valid: bool,
    /// URL after redirects, or the requested URL when no response arrived
    pub final_url: String,
    /// Status of the deciding response; `None` without a response
    pub status_code: Option<u16>,
    pub message: String,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    fn from_response(response: &Response, outcome: ProbeOutcome, message: String) -> Self {
        Self {
            valid: outcome == ProbeOutcome::Valid,
            final_url: response.url().to_string(),
            status_code: Some(response.status().as_u16()),
            message,
            outcome,
        }
    }

    fn from_error(url: &str, error: &reqwest::Error) -> Self {
        let (outcome, message) = if error.is_timeout() {
            (ProbeOutcome::Timeout, "Timeout connecting to stream".to_string())
        } else if error.is_redirect() {
            (ProbeOutcome::TooManyRedirects, "Too many redirects".to_string())
        } else {
            let detail = error.to_string();
            (
                ProbeOutcome::RequestError(detail.clone()),
                format!("Request error: {detail}"),
            )
        };

        Self {
            valid: false,
            final_url: url.to_string(),
            status_code: None,
            message,
            outcome,
        }
    }
}

/// Performs single probes. Each probe uses its own client so no pooled
/// connection outlives it.
#[derive(Debug, Clone)]
pub struct StreamProber {
    timeouts: ProbeTimeouts,
    max_redirects: usize,
}

impl StreamProber {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            timeouts: ProbeTimeouts::from(config),
            max_redirects: config.max_redirects,
        }
    }

    pub fn timeouts(&self) -> ProbeTimeouts {
        self.timeouts
    }

    /// Probe with the configured timeouts
    pub async fn probe(&self, url: &str, user_agent: &str) -> ProbeResult {
        self.probe_with_timeouts(url, user_agent, self.timeouts)
            .await
    }

    pub async fn probe_with_timeouts(
        &self,
        url: &str,
        user_agent: &str,
        timeouts: ProbeTimeouts,
    ) -> ProbeResult {
        let safe_url = UrlUtils::obfuscate_credentials(url);
        debug!("Probing {}", safe_url);

        if !UrlUtils::is_http(url) {
            warn!("Not probing {}: only http(s) URLs can be probed", safe_url);
            return ProbeResult {
                valid: false,
                final_url: url.to_string(),
                status_code: None,
                message: "Request error: unsupported URL".to_string(),
                outcome: ProbeOutcome::RequestError("unsupported URL".to_string()),
            };
        }

        let client = match self.build_client(timeouts) {
            Ok(client) => client,
            Err(e) => return ProbeResult::from_error(url, &e),
        };

        let result = Self::run_probe(&client, url, user_agent).await;
        if result.valid {
            debug!("Probe of {} succeeded: {}", safe_url, result.message);
        } else {
            warn!("Probe of {} failed: {}", safe_url, result.message);
        }
        result
    }

    fn build_client(&self, timeouts: ProbeTimeouts) -> reqwest::Result<Client> {
        Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .redirect(redirect::Policy::limited(self.max_redirects))
            .pool_max_idle_per_host(0)
            .build()
    }

    async fn run_probe(client: &Client, url: &str, user_agent: &str) -> ProbeResult {
        let head = match Self::send(client, Method::HEAD, url, user_agent).await {
            Ok(response) => response,
            Err(e) => return ProbeResult::from_error(url, &e),
        };

        if head.status().is_success() {
            return ProbeResult::from_response(
                &head,
                ProbeOutcome::Valid,
                "Valid (HEAD request)".to_string(),
            );
        }
        drop(head);

        let mut get = match Self::send(client, Method::GET, url, user_agent).await {
            Ok(response) => response,
            Err(e) => return ProbeResult::from_error(url, &e),
        };

        let status = get.status();
        if !status.is_success() {
            return ProbeResult::from_response(
                &get,
                ProbeOutcome::InvalidStatus(status.as_u16()),
                format!("Invalid HTTP status: {}", status.as_u16()),
            );
        }

        let content_type = get
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let received = match get.chunk().await {
            Ok(Some(chunk)) => chunk.len().min(PROBE_CHUNK_SIZE),
            Ok(None) => 0,
            Err(e) => return ProbeResult::from_error(url, &e),
        };

        let (outcome, mut message) = if received > 0 {
            (
                ProbeOutcome::Valid,
                format!("Valid (GET request, received {received} bytes)"),
            )
        } else {
            (ProbeOutcome::EmptyBody, "Empty response from server".to_string())
        };

        if !content_type.is_empty() {
            if is_stream_content_type(&content_type) {
                message.push_str(&format!(
                    " (Content-Type: {content_type}, recognized as valid stream format)"
                ));
            } else {
                message.push_str(&format!(
                    " (Content-Type: {content_type}, unrecognized but may still work)"
                ));
            }
        }

        ProbeResult::from_response(&get, outcome, message)
    }

    async fn send(
        client: &Client,
        method: Method,
        url: &str,
        user_agent: &str,
    ) -> reqwest::Result<Response> {
        let mut request = client
            .request(method, url)
            .header(CONNECTION, HeaderValue::from_static("close"));
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            request = request.header(USER_AGENT, value);
        }
        request.send().await
    }
}

/// Bounded pool for probes that run off the request path
#[derive(Debug, Clone)]
pub struct ProbePool {
    prober: StreamProber,
    permits: Arc<Semaphore>,
}

impl ProbePool {
    pub fn new(prober: StreamProber, max_concurrent: usize) -> Self {
        Self {
            prober,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(StreamProber::new(config), config.max_concurrent)
    }

    pub fn prober(&self) -> &StreamProber {
        &self.prober
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Probe once a slot is free
    pub async fn probe(&self, url: &str, user_agent: &str) -> ProbeResult {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return ProbeResult {
                    valid: false,
                    final_url: url.to_string(),
                    status_code: None,
                    message: "Probe pool closed".to_string(),
                    outcome: ProbeOutcome::RequestError("probe pool closed".to_string()),
                };
            }
        };
        self.prober.probe(url, user_agent).await
    }

    /// Probe every `(url, user_agent)` pair concurrently within the pool
    /// bound; results come back in input order.
    pub async fn probe_all(&self, targets: Vec<(String, String)>) -> Vec<ProbeResult> {
        let handles: Vec<_> = targets
            .into_iter()
            .map(|(url, user_agent)| {
                let pool = self.clone();
                tokio::spawn(async move { pool.probe(&url, &user_agent).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(ProbeResult {
                    valid: false,
                    final_url: String::new(),
                    status_code: None,
                    message: format!("Probe task failed: {e}"),
                    outcome: ProbeOutcome::RequestError(e.to_string()),
                }),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("video/mp2t", true)]
    #[case("application/vnd.apple.mpegurl", true)]
    #[case("Application/Octet-Stream", true)]
    #[case("audio/aac", true)]
    #[case("application/json", false)]
    #[case("text/html; charset=utf-8", false)]
    fn test_content_type_allow_list(#[case] content_type: &str, #[case] expected: bool) {
        assert_eq!(is_stream_content_type(content_type), expected);
    }

    #[test]
    fn test_chunk_bound_is_ten_packets() {
        assert_eq!(PROBE_CHUNK_SIZE, 1880);
    }

    #[tokio::test]
    async fn test_unroutable_url_is_request_error() {
        let prober = StreamProber::new(&ProbeConfig::default());
        let result = prober.probe("http://", "test-agent").await;
        assert!(!result.valid);
        assert_eq!(result.status_code, None);
        assert!(matches!(result.outcome, ProbeOutcome::RequestError(_)));
        assert_eq!(result.final_url, "http://");
    }

    #[test]
    fn test_pool_has_at_least_one_permit() {
        let pool = ProbePool::new(StreamProber::new(&ProbeConfig::default()), 0);
        assert_eq!(pool.available_permits(), 1);
    }
}
