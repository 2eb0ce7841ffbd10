//! Retry and rate-limit behavior of the CI client against a mock provider.

use ci_miner_lib::ci::{Client, FetchPolicy};
use core::time::Duration;
use std::time::Instant;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn policy(max_retries: u32) -> FetchPolicy {
    FetchPolicy {
        max_retries,
        base_backoff: Duration::from_millis(1),
        request_timeout: Duration::from_secs(5),
        preemptive_quota_threshold: 0,
        max_rate_limit_wait: Duration::from_secs(10),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/runs"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(None, server.uri(), policy(4)).unwrap();
    let resp = client.get(&format!("{}/runs", server.uri()), &[]).await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_client_errors_fail_immediately() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/runs"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(None, server.uri(), policy(4)).unwrap();
    let err = client.get(&format!("{}/runs", server.uri()), &[]).await.unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/runs"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = Client::new(None, server.uri(), policy(3)).unwrap();
    let err = client.get(&format!("{}/runs", server.uri()), &[]).await.unwrap_err();
    assert!(err.to_string().contains("after 3 attempt(s)"));
}

#[tokio::test]
async fn test_forbidden_without_exhausted_quota_consumes_retries() {
    let server = MockServer::start().await;

    // Quota left, so this is not a rate-limit response
    Mock::given(method("GET"))
        .and(path("/runs"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "10")
                .insert_header("x-ratelimit-reset", "4102444800"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = Client::new(None, server.uri(), policy(2)).unwrap();
    let _ = client.get(&format!("{}/runs", server.uri()), &[]).await.unwrap_err();
}

#[tokio::test]
async fn test_exhausted_quota_waits_for_reset_without_spending_retries() {
    let server = MockServer::start().await;
    let reset = chrono::Utc::now().timestamp() + 2;

    Mock::given(method("GET"))
        .and(path("/runs"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset.to_string().as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    // A single attempt is enough because the rate-limit wait does not consume it
    let client = Client::new(None, server.uri(), policy(1)).unwrap();
    let start = Instant::now();
    let resp = client.get(&format!("{}/runs", server.uri()), &[]).await.unwrap();

    assert_eq!(resp.status(), 200);
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn test_drained_quota_after_success_sleeps_before_returning() {
    let server = MockServer::start().await;
    let reset = chrono::Utc::now().timestamp() + 2;

    Mock::given(method("GET"))
        .and(path("/runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ok")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset.to_string().as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(None, server.uri(), policy(1)).unwrap();
    let start = Instant::now();
    let resp = client.get(&format!("{}/runs", server.uri()), &[]).await.unwrap();

    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_sends_auth_and_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/runs"))
        .and(header("authorization", "Bearer secret"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(Some("secret"), server.uri(), policy(1)).unwrap();
    let _ = client
        .get(&format!("{}/runs", server.uri()), &[("page", "2".to_string())])
        .await
        .unwrap();
}
