//! Network transport for probe requests

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::TransportFailure;

/// Everything the transport needs to issue one request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Path plus query, starting with `/`
    pub path: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl TransportRequest {
    /// Absolute URL for the request
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!("{}://{}:{}{}", scheme, host, self.port, self.path)
    }
}

/// Status and time until the response headers arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub elapsed: Duration,
}

/// Issues a single request and reports its latency
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportFailure>;
}

/// Transport settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("hashprobe/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 4,
        }
    }
}

/// reqwest-backed transport; connections are pooled per host by the client
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new transport
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let method = reqwest::Method::from_str(&request.method)
            .map_err(|_| TransportFailure::InvalidRequest(format!("method {}", request.method)))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        for (key, value) in &request.headers {
            if let (Ok(name), Ok(val)) = (HeaderName::from_str(key), HeaderValue::from_str(value)) {
                headers.insert(name, val);
            } else {
                tracing::warn!(header = %key, "Skipping invalid header");
            }
        }

        let builder = self
            .client
            .request(method, request.url())
            .headers(headers)
            .timeout(request.timeout)
            .body(request.body.clone());

        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| classify(&e, request.timeout))?;
        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // Drain so the connection can go back to the pool
        if let Err(e) = response.bytes().await {
            tracing::debug!(error = %e, "Failed to drain response body");
        }

        Ok(TransportResponse { status, elapsed })
    }
}

/// Map a reqwest error onto the failure taxonomy
fn classify(error: &reqwest::Error, timeout: Duration) -> TransportFailure {
    if error.is_timeout() {
        return TransportFailure::Timeout(timeout.as_millis() as u64);
    }

    let chain = error_chain(error);
    let lower = chain.to_lowercase();

    if lower.contains("connection refused") {
        TransportFailure::ConnectionRefused(chain)
    } else if lower.contains("connection reset") || lower.contains("broken pipe") {
        TransportFailure::ConnectionReset(chain)
    } else if error.is_connect() {
        TransportFailure::Connect(chain)
    } else if error.is_builder() {
        TransportFailure::InvalidRequest(chain)
    } else {
        TransportFailure::Request(chain)
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
