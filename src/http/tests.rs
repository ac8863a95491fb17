//! Tests for the HTTP client module

use super::*;
use crate::error::Error;
use std::collections::BTreeMap;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpClient {
    HttpClient::with_config(HttpClientConfig::builder().no_rate_limit().build()).unwrap()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert!(config.rate_limit.is_some());
    assert!(config.user_agent.starts_with("species-harvest/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(5))
        .header("X-Api-Key", "secret")
        .user_agent("test-agent/1.0")
        .rate_limit(RateLimiterConfig::new(4, 2))
        .build();

    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(
        config.default_headers.get("X-Api-Key"),
        Some(&"secret".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
    assert_eq!(config.rate_limit, Some(RateLimiterConfig::new(4, 2)));
    assert!(HttpClient::with_config(config).unwrap().has_rate_limiter());
}

#[tokio::test]
async fn test_get_json_sends_query_and_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Vespa velutina"))
        .and(header("X-Api-Key", "secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"items": [{"id": "1"}]}))
                .insert_header("x-ratelimit-remaining", "41")
                .insert_header("x-ratelimit-reset", "1700000000"),
        )
        .mount(&server)
        .await;

    let config = HttpClientConfig::builder()
        .no_rate_limit()
        .header("X-Api-Key", "secret")
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let response = client
        .get_json(
            &format!("{}/search", server.uri()),
            &[("q".to_string(), "Vespa velutina".to_string())],
            &BTreeMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["items"][0]["id"], "1");
    assert_eq!(response.rate_limit.remaining, Some(41));
    assert_eq!(
        response.rate_limit.reset_at.map(|t| t.timestamp()),
        Some(1_700_000_000)
    );
    assert!(!response.rate_limit.is_exhausted());
}

#[tokio::test]
async fn test_not_found_is_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/species/unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such taxon"))
        .mount(&server)
        .await;

    let response = client()
        .get_json(
            &format!("{}/species/unknown", server.uri()),
            &[],
            &BTreeMap::new(),
        )
        .await
        .unwrap();

    assert!(response.is_not_found());
    assert!(response.body.is_null());
}

#[tokio::test]
async fn test_quota_exceeded_is_quota_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(r#"{"error":{"message":"quotaExceeded"}}"#)
                .insert_header("x-ratelimit-reset", "1700000000"),
        )
        .mount(&server)
        .await;

    let err = client()
        .get_json(&format!("{}/search", server.uri()), &[], &BTreeMap::new())
        .await
        .unwrap_err();

    assert!(err.is_quota());
    assert_eq!(err.quota_reset().map(|t| t.timestamp()), Some(1_700_000_000));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client()
        .get_json(&format!("{}/search", server.uri()), &[], &BTreeMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client()
        .get_json(&format!("{}/search", server.uri()), &[], &BTreeMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
    assert!(err.is_retryable());
}
