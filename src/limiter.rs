//! Credential pool with quota tracking and round-robin rotation
//!
//! Tracks remaining rate-limit quota and reset time for every credential in
//! an ordered list, and selects which credential the next call should use.
//! Rotation is fixed round-robin with no weighting. When the pool rotates
//! onto a credential whose window has not yet reset, it sleeps the window off
//! - this bounds the worst-case stall to one quota window instead of busy
//! cycling across all exhausted keys.
//!
//! A pool is an explicit instance owned by the caller and passed by reference
//! into each call engine; multiple concurrent streams may share one pool, and
//! all mutations of rotation state happen under an internal async mutex.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{API_RESET_BUFFER_SECS, DEFAULT_COOLDOWN_SECS, QUOTA_RESERVE};

/// One complete, independently usable set of API signing material.
///
/// The pool never looks inside a credential; its shape belongs to the
/// provider adapter and the signing hook. Identity is the credential's
/// position in the pool's ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(serde_json::Value);

impl Credential {
    /// Wrap an opaque credential blob.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying blob.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Look up a string field of the blob, for signing hooks.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }
}

/// Last known rate-limit standing of one credential.
///
/// Starts optimistic (both fields unknown) and is updated only from the
/// headers of the most recent call made with that specific credential; stale
/// values persist until refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CredentialState {
    /// Remaining calls in the current quota window, if known
    pub remaining: Option<u64>,
    /// Unix timestamp (seconds) at which the window resets, if known
    pub reset_at: Option<i64>,
}

/// Header names carrying quota information, per provider.
#[derive(Debug, Clone)]
pub struct RateLimitHeaders {
    /// Header with the number of calls left in the window
    pub remaining: String,
    /// Header with the window reset time as Unix seconds
    pub reset: String,
}

impl Default for RateLimitHeaders {
    fn default() -> Self {
        Self {
            remaining: "x-rate-limit-remaining".to_string(),
            reset: "x-rate-limit-reset".to_string(),
        }
    }
}

/// Pool behavior knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Header names to parse quota information from
    pub headers: RateLimitHeaders,
    /// Rotate away once remaining quota drops to this threshold
    pub reserve: u64,
    /// Extra sleep past a credential's advertised reset time
    pub reset_buffer: Duration,
    /// Cooldown assumed when quota headers are missing or unparsable
    pub default_cooldown: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            headers: RateLimitHeaders::default(),
            reserve: QUOTA_RESERVE,
            reset_buffer: Duration::from_secs(API_RESET_BUFFER_SECS),
            default_cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        }
    }
}

/// Pool construction errors.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The credential list was empty
    #[error("credential pool requires at least one credential")]
    Empty,
}

struct PoolInner {
    index: usize,
    keys: Vec<Credential>,
    states: Vec<CredentialState>,
}

/// Ordered pool of credentials with per-key quota tracking.
pub struct CredentialPool {
    inner: Mutex<PoolInner>,
    config: PoolConfig,
    size: usize,
}

impl CredentialPool {
    /// Create a pool with default configuration.
    ///
    /// # Errors
    /// Returns [`PoolError::Empty`] if `keys` is empty.
    pub fn new(keys: Vec<Credential>) -> Result<Self, PoolError> {
        Self::with_config(keys, PoolConfig::default())
    }

    /// Create a pool with explicit configuration.
    ///
    /// # Errors
    /// Returns [`PoolError::Empty`] if `keys` is empty.
    pub fn with_config(keys: Vec<Credential>, config: PoolConfig) -> Result<Self, PoolError> {
        if keys.is_empty() {
            return Err(PoolError::Empty);
        }
        let size = keys.len();
        let states = vec![CredentialState::default(); size];
        Ok(Self {
            inner: Mutex::new(PoolInner {
                index: 0,
                keys,
                states,
            }),
            config,
            size,
        })
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the pool is empty. Always false for a constructed pool.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The currently selected credential.
    pub async fn current(&self) -> Credential {
        let inner = self.inner.lock().await;
        inner.keys[inner.index].clone()
    }

    /// Index of the currently selected credential.
    pub async fn current_index(&self) -> usize {
        self.inner.lock().await.index
    }

    /// Per-credential quota states, in pool order.
    pub async fn snapshot(&self) -> Vec<CredentialState> {
        self.inner.lock().await.states.clone()
    }

    /// Record the response headers of a call made with the current credential.
    ///
    /// Parses the remaining-quota and reset-time headers; unparsable headers
    /// mark the credential exhausted for a short default cooldown rather than
    /// failing. If the credential's remaining quota is at or below the
    /// reserve threshold the pool advances round-robin, and if the newly
    /// selected credential is itself known-exhausted with an unexpired
    /// window, this call sleeps until that window resets.
    ///
    /// The sleep happens with the pool lock released, so concurrent streams
    /// sharing the pool are not blocked on the mutex for a full window.
    pub async fn record_response(&self, headers: &HeaderMap) {
        let wait = {
            let mut inner = self.inner.lock().await;
            let now = chrono::Utc::now().timestamp();
            let index = inner.index;

            let state = match self.parse_quota(headers) {
                Some(state) => state,
                None => {
                    warn!(
                        "key {}: rate limit headers missing or unparsable, assuming exhausted",
                        index
                    );
                    CredentialState {
                        remaining: Some(0),
                        reset_at: Some(now + self.config.default_cooldown.as_secs() as i64),
                    }
                }
            };
            inner.states[index] = state;

            let exhausted = state.remaining.is_some_and(|r| r <= self.config.reserve);
            if !exhausted {
                None
            } else {
                debug!("key {} hit rate limit, rotating", index);
                inner.index = (index + 1) % self.size;

                let next = inner.states[inner.index];
                let still_limited = next.remaining.is_some_and(|r| r <= self.config.reserve);
                match next.reset_at {
                    Some(reset) if still_limited && reset > now => {
                        let wait = Duration::from_secs((reset - now) as u64) + self.config.reset_buffer;
                        debug!(
                            "key {} still in rate limit, sleeping {:?}",
                            inner.index, wait
                        );
                        Some(wait)
                    }
                    _ => None,
                }
            }
        };

        if let Some(wait) = wait {
            sleep(wait).await;
        }
    }

    /// Force rotation to the next credential, independent of quota state.
    ///
    /// Used when a response identifies the credential itself as the problem
    /// (suspended account, invalid token).
    pub async fn skip_key(&self) {
        let mut inner = self.inner.lock().await;
        debug!("key {}: forced rotation", inner.index);
        inner.index = (inner.index + 1) % self.size;
    }

    fn parse_quota(&self, headers: &HeaderMap) -> Option<CredentialState> {
        let remaining = headers
            .get(&self.config.headers.remaining)?
            .to_str()
            .ok()?
            .parse::<u64>()
            .ok()?;
        let reset_at = headers
            .get(&self.config.headers.reset)?
            .to_str()
            .ok()?
            .parse::<i64>()
            .ok()?;
        Some(CredentialState {
            remaining: Some(remaining),
            reset_at: Some(reset_at),
        })
    }
}
