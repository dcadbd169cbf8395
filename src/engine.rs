//! Composed endpoint-call engine
//!
//! Ties the transport, the response classifier, and the credential pool into
//! one logical "call endpoint" operation with full retry and rotation
//! semantics. A call either returns a [`CallResult`] - including give-up
//! responses, which are a normal answer the caller must inspect - or fails
//! with a fatal [`CallError`] that aborts only this call.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::{extract_error_code, Disposition, ErrorClassifier};
use crate::config::API_RETRY_MAX;
use crate::limiter::{Credential, CredentialPool};
use crate::transport::{ConnectError, Execute, HttpRequest};
use crate::{Method, Params};

/// Immutable description of one endpoint request.
///
/// Pagination code rebuilds a fresh descriptor for every page instead of
/// mutating a shared parameter map across retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Absolute endpoint URL
    pub url: String,
    /// Query (GET) or form (POST) parameters
    pub params: Params,
}

impl RequestDescriptor {
    /// Describe a GET request.
    pub fn get(url: impl Into<String>, params: Params) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            params,
        }
    }

    /// Describe a POST request.
    pub fn post(url: impl Into<String>, params: Params) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            params,
        }
    }
}

/// The decoded outcome of one endpoint call.
///
/// A non-2xx status here means the service decided, and the decision is an
/// error the caller should inspect - as opposed to [`CallError`], which means
/// no decision could be obtained at all.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    /// Decoded response payload; raw text wrapped in a JSON string when the
    /// body was not valid JSON
    pub payload: serde_json::Value,
    /// HTTP status code of the final response
    pub status_code: u16,
    /// Provider numeric error code, when the response carried one
    pub api_error_code: Option<i64>,
}

/// Fatal call failures.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Transport exhausted its connection attempts
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The retry budget ran out without success or a give-up decision
    #[error("call abandoned after {tries} tries (last status: {last_status:?})")]
    RetryExhausted {
        /// Number of tries consumed
        tries: u32,
        /// Status code of the last classifiable response, if any
        last_status: Option<u16>,
    },
}

/// Per-credential request signing hook.
///
/// Implementations read whatever fields their provider requires from the
/// opaque credential blob and attach signing material to the outgoing
/// request.
pub trait SignRequest: Send + Sync {
    /// Attach signing material for `credential` to `request`.
    fn sign(&self, request: &mut HttpRequest, credential: &Credential);
}

/// Bearer-token signer reading one field of the credential blob.
pub struct BearerSigner {
    field: String,
}

impl BearerSigner {
    /// Sign with `Authorization: Bearer <credential[field]>`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl SignRequest for BearerSigner {
    fn sign(&self, request: &mut HttpRequest, credential: &Credential) {
        let Some(token) = credential.field(&self.field) else {
            warn!("credential has no '{}' field, sending unsigned", self.field);
            return;
        };
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                request.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("credential token is not a valid header value"),
        }
    }
}

/// No-op signer for unauthenticated endpoints and tests.
pub struct NoopSigner;

impl SignRequest for NoopSigner {
    fn sign(&self, _request: &mut HttpRequest, _credential: &Credential) {}
}

/// Engine behavior knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum logical tries per call
    pub max_tries: u32,
    /// Non-2xx statuses treated as a successful answer for this endpoint
    /// (e.g. 403/404 on endpoints where those are expected data)
    pub accept_codes: Vec<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tries: API_RETRY_MAX,
            accept_codes: Vec::new(),
        }
    }
}

/// One logical "call endpoint" operation with retry and rotation semantics.
pub struct RestCallEngine {
    transport: Arc<dyn Execute>,
    classifier: ErrorClassifier,
    pool: Arc<CredentialPool>,
    signer: Arc<dyn SignRequest>,
    config: EngineConfig,
}

impl RestCallEngine {
    /// Compose an engine from its collaborators.
    ///
    /// The pool is shared by reference so several engines (one per stream)
    /// can draw from the same credential set.
    pub fn new(
        transport: Arc<dyn Execute>,
        classifier: ErrorClassifier,
        pool: Arc<CredentialPool>,
        signer: Arc<dyn SignRequest>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            classifier,
            pool,
            signer,
            config,
        }
    }

    /// The credential pool this engine draws from.
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Call an endpoint, retrying and rotating credentials as needed.
    ///
    /// # Errors
    /// - [`CallError::Connect`] when the transport gives up on the network
    /// - [`CallError::RetryExhausted`] when the try budget runs out without
    ///   success or a give-up decision
    ///
    /// Give-up classified responses are NOT errors: they return `Ok` with the
    /// status and provider error code set for the caller to inspect.
    pub async fn call(&self, desc: &RequestDescriptor) -> Result<CallResult, CallError> {
        let accept_codes = self.config.accept_codes.clone();
        self.call_accepting(desc, &accept_codes).await
    }

    /// Call an endpoint with an explicit accept list for this call only.
    ///
    /// Some endpoints return expected data under non-2xx statuses (e.g. 403
    /// for a protected account); listing those here returns them as a normal
    /// [`CallResult`] instead of running them through classification.
    ///
    /// # Errors
    /// Same as [`RestCallEngine::call`].
    pub async fn call_accepting(
        &self,
        desc: &RequestDescriptor,
        accept_codes: &[u16],
    ) -> Result<CallResult, CallError> {
        let mut tries: u32 = 0;
        let mut last_status = None;

        while tries < self.config.max_tries {
            let credential = self.pool.current().await;
            let mut request =
                HttpRequest::new(desc.method, desc.url.clone(), desc.params.clone());
            self.signer.sign(&mut request, &credential);

            let response = self.transport.execute(&request).await?;
            last_status = Some(response.status);

            if response.is_success() || accept_codes.contains(&response.status) {
                self.pool.record_response(&response.headers).await;

                match serde_json::from_str(&response.body) {
                    Ok(payload) => {
                        let api_error_code = if response.is_success() {
                            None
                        } else {
                            extract_error_code(&response.body)
                        };
                        return Ok(CallResult {
                            payload,
                            status_code: response.status,
                            api_error_code,
                        });
                    }
                    Err(e) => {
                        // Truncated or mangled body on an otherwise good
                        // response; retrying is cheaper than surfacing it
                        warn!(
                            "try {}: failed to decode body from {} ({}): {}",
                            tries, desc.url, response.status, e
                        );
                        tries += 1;
                        continue;
                    }
                }
            }

            let classification = self.classifier.classify(response.status, &response.body);
            match classification.disposition {
                Disposition::Retry => {
                    info!(
                        "try {}: status {} from {}, retrying",
                        tries, response.status, desc.url
                    );
                    self.pool.record_response(&response.headers).await;
                    tries += 1;
                }
                Disposition::SkipAndRetry => {
                    info!(
                        "try {}: status {} (code {:?}) from {}, rotating credential",
                        tries, response.status, classification.api_error_code, desc.url
                    );
                    self.pool.skip_key().await;
                    tries += 1;
                }
                Disposition::Giveup => {
                    debug!(
                        "giving up on {}: status {} code {:?}",
                        desc.url, response.status, classification.api_error_code
                    );
                    return Ok(CallResult {
                        payload: decode_best_effort(response.body),
                        status_code: classification.status_code,
                        api_error_code: classification.api_error_code,
                    });
                }
            }
        }

        Err(CallError::RetryExhausted { tries, last_status })
    }
}

/// Decode a body as JSON, falling back to the raw text as a JSON string.
fn decode_best_effort(body: String) -> serde_json::Value {
    match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(_) => serde_json::Value::String(body),
    }
}
