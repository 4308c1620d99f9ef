//! Throttling, transient error and token handling tests.

mod common;

use common::*;
use rosterwatch_entra::EntraError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, Request, Respond, ResponseTemplate};

/// Answers with `failures` copies of `failure`, then with `success`.
struct FailThenSucceed {
    failures: u32,
    failure: ResponseTemplate,
    success: ResponseTemplate,
    calls: Arc<AtomicU32>,
}

impl Respond for FailThenSucceed {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            self.failure.clone()
        } else {
            self.success.clone()
        }
    }
}

fn members_body() -> serde_json::Value {
    create_odata_response(generate_test_users("m", 2), None)
}

/// Tests that 429 with Retry-After is retried until it succeeds.
#[tokio::test]
async fn test_429_is_retried() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;

    let calls = Arc::new(AtomicU32::new(0));
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/group-1/members"))
        .respond_with(FailThenSucceed {
            failures: 2,
            failure: ResponseTemplate::new(429)
                .insert_header("Retry-After", "0")
                .set_body_json(create_odata_error("TooManyRequests", "Slow down")),
            success: ResponseTemplate::new(200).set_body_json(members_body()),
            calls: calls.clone(),
        })
        .mount(&mock.server)
        .await;

    let members = mock.fetcher().fetch_members("group-1").await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Tests that sustained throttling surfaces as a rate limit error.
#[tokio::test]
async fn test_429_exhausts_retries() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;

    // for_testing() allows 3 retries, so 4 requests in total
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/group-1/members"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(4)
        .mount(&mock.server)
        .await;

    let err = mock.fetcher().fetch_members("group-1").await.unwrap_err();
    assert!(matches!(err, EntraError::RateLimited { retry_after_secs: 0 }));
}

/// Tests that 503 is retried with backoff.
#[tokio::test]
async fn test_503_is_retried() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;

    let calls = Arc::new(AtomicU32::new(0));
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/group-1/members"))
        .respond_with(FailThenSucceed {
            failures: 1,
            failure: ResponseTemplate::new(503),
            success: ResponseTemplate::new(200).set_body_json(members_body()),
            calls: calls.clone(),
        })
        .mount(&mock.server)
        .await;

    let members = mock.fetcher().fetch_members("group-1").await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Tests that persistent gateway errors give up after the configured retries.
#[tokio::test]
async fn test_502_exhausts_retries() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/groups/group-1/members"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&mock.server)
        .await;

    let err = mock.fetcher().fetch_members("group-1").await.unwrap_err();
    assert!(matches!(err, EntraError::MaxRetriesExceeded { attempts: 3 }));
}

/// Tests that one token serves every Graph call and is sent as a bearer.
#[tokio::test]
async fn test_token_is_cached_and_sent() {
    let mock = MockGraphServer::new().await;

    Mock::given(method("POST"))
        .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_token_response("cached-token", 3600)),
        )
        .expect(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/group-1/members"))
        .and(header("Authorization", "Bearer cached-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(members_body()))
        .expect(2)
        .mount(&mock.server)
        .await;

    let fetcher = mock.fetcher();
    fetcher.fetch_members("group-1").await.unwrap();
    fetcher.fetch_members("group-1").await.unwrap();
}

/// Tests that a rejected token request is an authentication error.
#[tokio::test]
async fn test_token_failure_is_auth_error() {
    let mock = MockGraphServer::new().await;

    Mock::given(method("POST"))
        .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&mock.server)
        .await;

    let err = mock.fetcher().fetch_members("group-1").await.unwrap_err();
    assert!(matches!(err, EntraError::Auth(_)));
    assert!(err.to_string().contains("invalid_client"));
}

/// Tests that a 401 from Graph triggers one token refresh.
#[tokio::test]
async fn test_unauthorized_refreshes_token_once() {
    let mock = MockGraphServer::new().await;

    let token_calls = Arc::new(AtomicU32::new(0));
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
        .respond_with(FailThenSucceed {
            failures: 1,
            failure: ResponseTemplate::new(200)
                .set_body_json(create_token_response("stale-token", 3600)),
            success: ResponseTemplate::new(200)
                .set_body_json(create_token_response("fresh-token", 3600)),
            calls: token_calls.clone(),
        })
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/group-1/members"))
        .and(header("Authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(members_body()))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/group-1/members"))
        .and(header("Authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock.server)
        .await;

    let members = mock.fetcher().fetch_members("group-1").await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(token_calls.load(Ordering::SeqCst), 2);
}
