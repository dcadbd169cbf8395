//! HTTP transport with bounded connection-failure retries
//!
//! Executes one HTTP call at a time. The only errors handled here are
//! connection-level failures (refused, DNS, timeout, dropped mid-body); the
//! strategy is deliberately simple: wait a fixed number of seconds and retry,
//! up to a bounded attempt count. HTTP status codes are never inspected at
//! this layer - a response with any status is a successful transport outcome
//! and is handed to the caller for classification.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{
    CALL_TIMEOUT_SECS, CONNECT_RETRY_AFTER_SECS, CONNECT_RETRY_MAX, HTTP_CONNECT_TIMEOUT_SECS,
};
use crate::{Method, Params};

/// A fully described HTTP request ready for execution.
///
/// Built fresh for every attempt from an immutable descriptor plus the signing
/// headers for the active credential.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute request URL
    pub url: String,
    /// Query parameters (GET) or form body (POST)
    pub params: Params,
    /// Extra headers, typically signing material
    pub headers: HeaderMap,
}

impl HttpRequest {
    /// Create a request with no extra headers.
    pub fn new(method: Method, url: impl Into<String>, params: Params) -> Self {
        Self {
            method,
            url: url.into(),
            params,
            headers: HeaderMap::new(),
        }
    }
}

/// The raw outcome of one HTTP exchange.
///
/// Status and headers are kept alongside the body text so the caller can
/// classify the response and update quota bookkeeping without re-reading
/// the wire.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport exhausted its connection attempts.
#[derive(Debug, thiserror::Error)]
#[error("connection failed after {attempts} attempts: {source}")]
pub struct ConnectError {
    /// Number of attempts made before giving up
    pub attempts: u32,
    /// The last transport-level failure
    #[source]
    pub source: reqwest::Error,
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum connection attempts per call
    pub connect_retry_max: u32,
    /// Fixed delay between attempts
    pub connect_retry_after: Duration,
    /// Overall per-request timeout
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_retry_max: CONNECT_RETRY_MAX,
            connect_retry_after: Duration::from_secs(CONNECT_RETRY_AFTER_SECS),
            timeout: Duration::from_secs(CALL_TIMEOUT_SECS),
        }
    }
}

/// Executor seam between the call engine and the network.
///
/// [`Transport`] is the production implementation; tests drive the engine with
/// scripted implementations of this trait.
#[async_trait]
pub trait Execute: Send + Sync {
    /// Execute one HTTP call, retrying only on transport-level failures.
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse, ConnectError>;
}

/// HTTP transport over a pooled [`reqwest::Client`].
///
/// The client is configured with explicit connect and request timeouts to
/// prevent indefinite hangs, and reuses persistent connections across calls.
pub struct Transport {
    client: Client,
    config: TransportConfig,
}

impl Transport {
    /// Create a transport with the given configuration.
    ///
    /// # Errors
    /// Returns the underlying builder error if the TLS backend cannot be
    /// initialized.
    pub fn new(config: TransportConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(config.timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a transport around an existing client, keeping its pooling.
    ///
    /// A first attempt is always made; `connect_retry_max` bounds the total,
    /// so a value of zero behaves the same as one.
    pub fn with_client(client: Client, config: TransportConfig) -> Self {
        Self { client, config }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url).query(&request.params),
            Method::Post => self.client.post(&request.url).form(&request.params),
        };
        builder.headers(request.headers.clone())
    }

    /// One send-and-read attempt. A dropped connection mid-body is still a
    /// transport failure.
    async fn attempt(&self, request: &HttpRequest) -> Result<RawResponse, reqwest::Error> {
        // RequestBuilder is single-use; rebuild from the descriptor each attempt
        let response = self.build_request(request).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Execute for Transport {
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse, ConnectError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.attempt(request).await {
                Ok(response) => {
                    debug!(
                        "{} {} -> {} ({} bytes, attempt {})",
                        request.method,
                        request.url,
                        response.status,
                        response.body.len(),
                        attempt
                    );
                    return Ok(response);
                }
                Err(e) if attempt < self.config.connect_retry_max => {
                    warn!(
                        "attempt {}/{} to {} failed: {}",
                        attempt, self.config.connect_retry_max, request.url, e
                    );
                    sleep(self.config.connect_retry_after).await;
                }
                Err(source) => {
                    return Err(ConnectError {
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }
}
