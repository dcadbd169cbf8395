//! Response classification policy
//!
//! Maps an HTTP status code plus a provider-specific numeric error code to
//! one of three dispositions. HTTP status alone is too coarse: a 403 can mean
//! "account suspended" (rotate to another credential) or "forbidden content"
//! (give up on this request); only the numeric code embedded in the error
//! payload disambiguates.
//!
//! Lookup order: exact api error code, then exact status code, then any 5xx
//! defaults to retry, then give up.

use std::collections::HashMap;
use tracing::debug;

/// What to do with a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Transient fault; retry with the same credential after any quota wait
    Retry,
    /// Credential-specific fault (suspended/invalid token); force rotation
    SkipAndRetry,
    /// Non-recoverable for this request; surfaced as a normal answer
    Giveup,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Disposition::Retry => "retry",
            Disposition::SkipAndRetry => "skip_and_retry",
            Disposition::Giveup => "giveup",
        };
        write!(f, "{s}")
    }
}

/// The outcome of classifying one failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The decided disposition
    pub disposition: Disposition,
    /// HTTP status code of the response
    pub status_code: u16,
    /// Provider numeric error code extracted from the body, if any
    pub api_error_code: Option<i64>,
}

/// Classifier built from per-provider rule tables.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    status_rules: HashMap<u16, Disposition>,
    code_rules: HashMap<i64, Disposition>,
}

/// Generic HTTP status table usable for most JSON REST providers.
///
/// 420 and 429 are throttling signals; everything else in the 4xx range is a
/// request the server understood and refused.
pub fn http_status_rules() -> HashMap<u16, Disposition> {
    use Disposition::*;
    HashMap::from([
        (400, Giveup),
        (401, Giveup),
        (403, Giveup),
        (404, Giveup),
        (406, Giveup),
        (410, Giveup),
        (420, Retry),
        (422, Giveup),
        (429, Retry),
        (500, Retry),
        (502, Retry),
        (503, Retry),
        (504, Retry),
    ])
}

impl ErrorClassifier {
    /// Build a classifier from explicit rule tables.
    pub fn new(
        status_rules: HashMap<u16, Disposition>,
        code_rules: HashMap<i64, Disposition>,
    ) -> Self {
        Self {
            status_rules,
            code_rules,
        }
    }

    /// Build a classifier with the generic HTTP table and no provider codes.
    pub fn generic() -> Self {
        Self::new(http_status_rules(), HashMap::new())
    }

    /// Decide what to do with a failed response.
    ///
    /// # Arguments
    /// * `status_code` - HTTP status of the response (non-2xx)
    /// * `body` - response body text, parsed best-effort for an error code
    pub fn classify(&self, status_code: u16, body: &str) -> Classification {
        let api_error_code = extract_error_code(body);

        let disposition = api_error_code
            .and_then(|code| self.code_rules.get(&code).copied())
            .or_else(|| self.status_rules.get(&status_code).copied())
            .unwrap_or(if (500..600).contains(&status_code) {
                Disposition::Retry
            } else {
                Disposition::Giveup
            });

        debug!(
            "classified response: status_code={} api_error_code={:?} logic={}",
            status_code, api_error_code, disposition
        );

        Classification {
            disposition,
            status_code,
            api_error_code,
        }
    }
}

/// Best-effort extraction of a provider numeric error code.
///
/// Understands the common `{"errors": [{"code": N, ...}]}` envelope and a
/// flat `{"code": N}` fallback. Unparsable bodies yield `None`.
pub fn extract_error_code(body: &str) -> Option<i64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(code) = value
        .get("errors")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_i64())
    {
        return Some(code);
    }
    value.get("code").and_then(|c| c.as_i64())
}
