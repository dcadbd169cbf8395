//! # Quarry
//!
//! Resilient client primitives for polling rate-limited, paginated REST APIs.
//! Designed for long-running collection jobs that must make forward progress
//! despite unreliable networks, server throttling, and exhaustible
//! per-credential rate-limit quotas.
//!
//! ## Features
//!
//! - **Robust Transport**: bounded fixed-delay retries on connection failures,
//!   never on HTTP status
//! - **Response Classification**: maps HTTP status + provider error codes to
//!   retry / rotate / give-up dispositions
//! - **Credential Rotation**: round-robin rotation across a pool of API keys
//!   with per-key quota tracking and reset-window cooldowns
//! - **Generic Pagination**: lazy descending-id and cursor page sequences over
//!   arbitrary "fetch one page" functions, bounded by an item budget
//! - **Type-Safe**: typed results distinguish "could not obtain a decision"
//!   (fatal) from "the service decided, and the decision is an error"
//!
//! ## Quick Start
//!
//! ```no_run
//! use quarry::engine::{BearerSigner, EngineConfig, RestCallEngine};
//! use quarry::limiter::CredentialPool;
//! use quarry::transport::Transport;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Load credentials and build the shared pool
//! let keys = quarry::keys::load_keys("keys.json")?;
//! let pool = Arc::new(CredentialPool::new(keys)?);
//!
//! // Compose the call engine
//! let engine = RestCallEngine::new(
//!     Arc::new(Transport::new(Default::default())?),
//!     Default::default(),
//!     pool,
//!     Arc::new(BearerSigner::new("access_token")),
//!     EngineConfig::default(),
//! );
//!
//! // One logical endpoint call, with full retry and rotation semantics
//! let desc = quarry::engine::RequestDescriptor::get(
//!     "https://api.example.com/1.1/items.json",
//!     vec![("count".into(), "200".into())],
//! );
//! let result = engine.call(&desc).await?;
//! println!("status={} items={}", result.status_code, result.payload);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`transport`] - HTTP execution with bounded connection-failure retries
//! - [`classify`] - response classification policy (retry / rotate / give up)
//! - [`limiter`] - credential pool with quota tracking and round-robin rotation
//! - [`engine`] - composed "call endpoint" operation
//! - [`paginate`] - lazy descending-id and cursor page sequences
//! - [`keys`] - credential file loading
//! - [`providers`] - provider adapters illustrating reuse of the core contract

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// Response classification policy
pub mod classify;

/// Numeric policy constants shared across modules
pub mod config;

/// Composed endpoint-call engine
pub mod engine;

/// Credential file loading
pub mod keys;

/// Credential pool with quota tracking and rotation
pub mod limiter;

/// Lazy pagination sequences
pub mod paginate;

/// Provider adapters
pub mod providers;

/// HTTP execution with bounded retries
pub mod transport;

// Re-export commonly used types
pub use classify::{Classification, Disposition, ErrorClassifier};
pub use engine::{CallError, CallResult, RequestDescriptor, RestCallEngine};
pub use limiter::{Credential, CredentialPool};
pub use paginate::{CursorPages, IdPages, Page, PageMeta};
pub use transport::{ConnectError, Transport};

/// Query or form parameters for a single request.
///
/// Descriptors are rebuilt fresh for every page from an owned parameter list,
/// so retries and concurrent streams never alias a shared mutable map.
pub type Params = Vec<(String, String)>;

/// HTTP method for a request descriptor.
///
/// Only the two verbs the runtime actually issues; query parameters ride on
/// the URL for GET and in the form body for POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// HTTP GET with query parameters
    Get,
    /// HTTP POST with form-encoded body parameters
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
        };
        write!(f, "{s}")
    }
}
