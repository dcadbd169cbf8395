//! Shared helpers for integration tests

use async_trait::async_trait;
use quarry::engine::{BearerSigner, EngineConfig, RestCallEngine};
use quarry::limiter::{Credential, CredentialPool, PoolConfig};
use quarry::transport::{ConnectError, Execute, HttpRequest, RawResponse};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Initialize test logging once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Transport double that replays a scripted response sequence and records
/// which Authorization header each call carried.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<RawResponse>>,
    calls: AtomicUsize,
    seen_auth: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<RawResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
            seen_auth: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_auth(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().unwrap().clone()
    }
}

#[async_trait]
impl Execute for ScriptedTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse, ConnectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_auth.lock().unwrap().push(
            request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => Ok(response),
            None => panic!("scripted transport ran out of responses"),
        }
    }
}

/// A response with no rate-limit headers.
pub fn response(status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        headers: HeaderMap::new(),
        body: body.to_string(),
    }
}

/// A response carrying quota headers for the credential that made the call.
pub fn response_with_quota(status: u16, body: &str, remaining: u64, reset_at: i64) -> RawResponse {
    let mut resp = response(status, body);
    resp.headers.insert(
        HeaderName::from_static("x-rate-limit-remaining"),
        HeaderValue::from_str(&remaining.to_string()).unwrap(),
    );
    resp.headers.insert(
        HeaderName::from_static("x-rate-limit-reset"),
        HeaderValue::from_str(&reset_at.to_string()).unwrap(),
    );
    resp
}

/// Bearer-token credentials named token-0, token-1, ...
pub fn test_keys(n: usize) -> Vec<Credential> {
    (0..n)
        .map(|i| Credential::new(json!({ "access_token": format!("token-{i}") })))
        .collect()
}

/// Engine over a scripted transport and a fresh pool of `n_keys` credentials.
pub fn scripted_engine(
    transport: Arc<ScriptedTransport>,
    n_keys: usize,
    config: EngineConfig,
) -> RestCallEngine {
    let pool = Arc::new(CredentialPool::with_config(test_keys(n_keys), PoolConfig::default()).unwrap());
    RestCallEngine::new(
        transport,
        quarry::providers::twitter::classifier(),
        pool,
        Arc::new(BearerSigner::new("access_token")),
        config,
    )
}
