//! Runtime policy constants
//!
//! Central home for the numeric knobs shared across transport, engine, and
//! credential pool. Each constant carries the conservative default used by
//! long-running collection jobs; callers override them through the per-module
//! config structs.

use std::time::Duration;

/// Maximum number of connection attempts per HTTP call.
/// Covers transient DNS failures and dropped connections without stalling a
/// job for more than ~30 seconds on a dead network.
pub const CONNECT_RETRY_MAX: u32 = 6;

/// Fixed delay between connection attempts (seconds).
/// Connection failures are usually either instantly gone or minutes-long;
/// a short fixed delay handles the first case and the attempt bound the second.
pub const CONNECT_RETRY_AFTER_SECS: u64 = 5;

/// Overall per-request timeout (seconds).
/// Matches the slowest well-behaved responses seen from large timeline pages.
pub const CALL_TIMEOUT_SECS: u64 = 60;

/// HTTP connect timeout (seconds) - time to establish the TCP connection.
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum number of logical tries per endpoint call.
/// Bounds the retry/rotate loop in the call engine; each try is one HTTP
/// round-trip that produced a classifiable response.
pub const API_RETRY_MAX: u32 = 10;

/// Extra sleep applied after a credential's advertised reset time (seconds).
/// Provider reset clocks are coarse; waking exactly on the boundary tends to
/// land one more throttled response.
pub const API_RESET_BUFFER_SECS: u64 = 5;

/// Cooldown applied when rate-limit headers are missing or unparsable (seconds).
/// Treating the credential as exhausted for a short window is the safe reading
/// of an unreadable quota.
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

/// Remaining-quota threshold at which the pool rotates away from a credential.
/// Leaving a small reserve avoids burning the final request of a window on a
/// response whose headers arrive too late to matter.
pub const QUOTA_RESERVE: u64 = 1;

/// Fixed connection-retry delay as a [`Duration`].
pub fn connect_retry_after() -> Duration {
    Duration::from_secs(CONNECT_RETRY_AFTER_SECS)
}

/// Default cooldown as a [`Duration`].
pub fn default_cooldown() -> Duration {
    Duration::from_secs(DEFAULT_COOLDOWN_SECS)
}
