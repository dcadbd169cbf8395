//! Credential pool rotation and quota-window behavior

use super::support::{response_with_quota, scripted_engine, test_keys, ScriptedTransport};
use quarry::engine::{EngineConfig, RequestDescriptor};
use quarry::limiter::{CredentialPool, PoolConfig};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn quota_headers(remaining: u64, reset_at: i64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-rate-limit-remaining"),
        HeaderValue::from_str(&remaining.to_string()).unwrap(),
    );
    headers.insert(
        HeaderName::from_static("x-rate-limit-reset"),
        HeaderValue::from_str(&reset_at.to_string()).unwrap(),
    );
    headers
}

#[tokio::test]
async fn test_repeated_exhaustion_cycles_all_credentials_in_order() {
    let n = 4;
    let pool = CredentialPool::new(test_keys(n)).unwrap();
    let expired = chrono::Utc::now().timestamp() - 1;

    // Two full laps: every exhaustion signal advances exactly one position
    for lap in 0..2 {
        for expected in 0..n {
            let index = pool.current_index().await;
            assert_eq!(index, expected, "lap {lap}");
            assert!(index < pool.len());
            pool.record_response(&quota_headers(0, expired)).await;
        }
    }
    assert_eq!(pool.current_index().await, 0);
}

#[tokio::test]
async fn test_skip_key_cycles_independent_of_quota() {
    let pool = CredentialPool::new(test_keys(3)).unwrap();

    for expected in [1, 2, 0, 1] {
        pool.skip_key().await;
        assert_eq!(pool.current_index().await, expected);
    }
}

#[tokio::test]
async fn test_exhausted_first_credential_moves_next_call_to_second() {
    // credential[0] reports remaining_quota=0; the very next call must be
    // signed with credential[1]
    let reset = chrono::Utc::now().timestamp() + 600;
    let transport = Arc::new(ScriptedTransport::new(vec![
        response_with_quota(200, r#"[]"#, 0, reset),
        response_with_quota(200, r#"[]"#, 100, reset),
    ]));
    let engine = scripted_engine(transport.clone(), 2, EngineConfig::default());
    let desc = RequestDescriptor::get("https://api.twitter.com/1.1/friends/ids.json", vec![]);

    engine.call(&desc).await.unwrap();
    engine.call(&desc).await.unwrap();

    assert_eq!(
        transport.seen_auth(),
        vec![
            Some("Bearer token-0".to_string()),
            Some("Bearer token-1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_rotation_onto_exhausted_credential_sleeps_off_the_window() {
    let config = PoolConfig {
        reset_buffer: Duration::ZERO,
        ..PoolConfig::default()
    };
    let pool = CredentialPool::with_config(test_keys(2), config).unwrap();
    let now = chrono::Utc::now().timestamp();

    // Key 0 exhausts with a 2-second window; rotation lands on fresh key 1
    pool.record_response(&quota_headers(0, now + 2)).await;
    assert_eq!(pool.current_index().await, 1);

    // Key 1 exhausts too; rotation lands back on key 0, whose window has not
    // elapsed, so the pool must block until it does
    let start = Instant::now();
    pool.record_response(&quota_headers(0, now + 2)).await;
    assert_eq!(pool.current_index().await, 0);
    assert!(
        start.elapsed() >= Duration::from_millis(1500),
        "expected the pool to sleep off the quota window, waited {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_quota_state_tracks_only_the_reporting_credential() {
    let pool = CredentialPool::new(test_keys(3)).unwrap();
    let reset = chrono::Utc::now().timestamp() + 900;

    pool.record_response(&quota_headers(10, reset)).await;
    pool.skip_key().await;
    pool.record_response(&quota_headers(7, reset)).await;

    let states = pool.snapshot().await;
    assert_eq!(states[0].remaining, Some(10));
    assert_eq!(states[1].remaining, Some(7));
    // Never used, still optimistic
    assert_eq!(states[2].remaining, None);
    assert_eq!(states[2].reset_at, None);
}
