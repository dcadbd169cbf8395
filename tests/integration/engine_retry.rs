//! Retry, rotation, and give-up semantics of the call engine

use super::support::{response, response_with_quota, scripted_engine, ScriptedTransport};
use quarry::engine::{CallError, EngineConfig, RequestDescriptor};
use std::sync::Arc;

fn timeline_desc() -> RequestDescriptor {
    RequestDescriptor::get(
        "https://api.twitter.com/1.1/statuses/user_timeline.json",
        vec![("user_id".into(), "12345".into())],
    )
}

fn far_reset() -> i64 {
    chrono::Utc::now().timestamp() + 900
}

#[tokio::test]
async fn test_giveup_returns_immediately_without_retries() {
    let body = r#"{"errors": [{"code": 34, "message": "page does not exist"}]}"#;
    let transport = Arc::new(ScriptedTransport::new(vec![response(404, body)]));
    let engine = scripted_engine(transport.clone(), 2, EngineConfig::default());

    let result = engine.call(&timeline_desc()).await.unwrap();

    assert_eq!(result.status_code, 404);
    assert_eq!(result.api_error_code, Some(34));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_retry_until_success_consumes_exact_tries() {
    let max_tries = 10u32;
    // max_tries - 1 retryable server errors, then success. Quota headers show
    // plenty remaining so the pool never rotates or sleeps.
    let mut script: Vec<_> = (0..max_tries - 1)
        .map(|_| response_with_quota(500, "oops", 100, far_reset()))
        .collect();
    script.push(response_with_quota(200, r#"{"ok": true}"#, 99, far_reset()));

    let transport = Arc::new(ScriptedTransport::new(script));
    let engine = scripted_engine(
        transport.clone(),
        1,
        EngineConfig {
            max_tries,
            accept_codes: vec![],
        },
    );

    let result = engine.call(&timeline_desc()).await.unwrap();

    assert_eq!(result.status_code, 200);
    assert_eq!(result.payload["ok"], serde_json::json!(true));
    assert_eq!(transport.calls(), max_tries as usize);
}

#[tokio::test]
async fn test_retry_budget_exhaustion_is_fatal() {
    let script: Vec<_> = (0..3)
        .map(|_| response_with_quota(503, "overloaded", 50, far_reset()))
        .collect();
    let transport = Arc::new(ScriptedTransport::new(script));
    let engine = scripted_engine(
        transport.clone(),
        1,
        EngineConfig {
            max_tries: 3,
            accept_codes: vec![],
        },
    );

    let err = engine.call(&timeline_desc()).await.unwrap_err();

    match err {
        CallError::RetryExhausted { tries, last_status } => {
            assert_eq!(tries, 3);
            assert_eq!(last_status, Some(503));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_skip_and_retry_rotates_credential() {
    // Suspended-account error on the first credential, then success
    let suspended = r#"{"errors": [{"code": 64, "message": "suspended"}]}"#;
    let transport = Arc::new(ScriptedTransport::new(vec![
        response(403, suspended),
        response_with_quota(200, r#"[]"#, 100, far_reset()),
    ]));
    let engine = scripted_engine(transport.clone(), 2, EngineConfig::default());

    let result = engine.call(&timeline_desc()).await.unwrap();

    assert_eq!(result.status_code, 200);
    assert_eq!(
        transport.seen_auth(),
        vec![
            Some("Bearer token-0".to_string()),
            Some("Bearer token-1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_accepted_status_is_a_normal_answer() {
    // 403 is accept-listed for this endpoint; body decodes and is returned
    let protected = r#"{"errors": [{"code": 179, "message": "not authorized"}]}"#;
    let transport = Arc::new(ScriptedTransport::new(vec![response_with_quota(
        403,
        protected,
        100,
        far_reset(),
    )]));
    let engine = scripted_engine(transport.clone(), 1, EngineConfig::default());

    let result = engine
        .call_accepting(&timeline_desc(), &[403, 404])
        .await
        .unwrap();

    assert_eq!(result.status_code, 403);
    assert_eq!(result.api_error_code, Some(179));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_undecodable_success_body_is_retried() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        response_with_quota(200, "<html>truncated", 100, far_reset()),
        response_with_quota(200, r#"{"ok": 1}"#, 99, far_reset()),
    ]));
    let engine = scripted_engine(transport.clone(), 1, EngineConfig::default());

    let result = engine.call(&timeline_desc()).await.unwrap();

    assert_eq!(result.payload["ok"], serde_json::json!(1));
    assert_eq!(transport.calls(), 2);
}
