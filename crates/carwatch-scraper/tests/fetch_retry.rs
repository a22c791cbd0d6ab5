//! Integration tests for `HttpFetcher` retry behaviour and the phone
//! lookup request.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no real
//! network traffic is made. Jitter is zeroed and backoff shrunk to
//! milliseconds to keep the suite fast.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header_exists, headers, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use carwatch_scraper::{lookup_phone, FetchPolicy, HttpFetcher, LookupMeta, PageFetch};

fn fast_policy(max_attempts: u32) -> FetchPolicy {
    FetchPolicy {
        max_attempts,
        jitter_min: Duration::ZERO,
        jitter_max: Duration::ZERO,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(5),
        request_timeout: Duration::from_secs(5),
    }
}

fn fetcher(max_attempts: u32) -> HttpFetcher {
    HttpFetcher::new(fast_policy(max_attempts)).expect("failed to build test HttpFetcher")
}

// ---------------------------------------------------------------------------
// Retryable statuses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn persistent_503_is_attempted_max_attempts_times_then_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let body = fetcher(3).get(&format!("{}/page", server.uri())).await;
    assert!(body.is_empty(), "expected empty body, got: {body:?}");
}

#[tokio::test]
async fn transient_429_recovers_on_next_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fetcher(3).get(&format!("{}/page", server.uri())).await;
    assert_eq!(body, "<html>ok</html>");
}

// ---------------------------------------------------------------------------
// Fatal statuses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let body = fetcher(5).get(&format!("{}/gone", server.uri())).await;
    assert!(body.is_empty());
}

#[tokio::test]
async fn timed_out_request_is_retried_until_attempts_run_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_millis(800)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(FetchPolicy {
        request_timeout: Duration::from_millis(200),
        ..fast_policy(3)
    })
    .expect("failed to build test HttpFetcher");

    let body = fetcher.get(&format!("{}/slow", server.uri())).await;
    assert!(body.is_empty(), "expected empty body, got: {body:?}");
}

#[tokio::test]
async fn unreachable_host_returns_empty() {
    let body = fetcher(2).get("http://127.0.0.1:9/unreachable").await;
    assert!(body.is_empty());
}

// ---------------------------------------------------------------------------
// Request shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requests_carry_rotating_agent_and_language() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header_exists("user-agent"))
        // wiremock splits comma-separated header values
        .and(headers("accept-language", vec!["uk-UA", "uk;q=0.9", "en;q=0.8"]))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(fetcher(1).get(&format!("{}/page", server.uri())).await, "hello");
}

#[tokio::test]
async fn post_json_sends_body() {
    let server = MockServer::start().await;
    let payload = json!({"autoId": 1, "langId": 4});
    Mock::given(method("POST"))
        .and(path("/popup"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fetcher(1)
        .post_json(&format!("{}/popup", server.uri()), &payload)
        .await;
    assert_eq!(body, "{}");
}

// ---------------------------------------------------------------------------
// Phone lookup
// ---------------------------------------------------------------------------

fn meta() -> LookupMeta {
    LookupMeta {
        auto_id: "35012345".to_string(),
        user_id: "777".to_string(),
        phone_id: "9988".to_string(),
        title: "BMW X5".to_string(),
        avatar: String::new(),
        user_name: "Олег".to_string(),
    }
}

#[tokio::test]
async fn lookup_phone_reads_phone_str_and_canonicalizes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/popup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"additionalParams": {"phoneStr": "(067) 123 45 67"}}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let phone = lookup_phone(
        &fetcher(1),
        &format!("{}/popup", server.uri()),
        "https://auto.ria.com/uk/auto_bmw_x5_35012345.html",
        &meta(),
    )
    .await;
    assert_eq!(phone.as_deref(), Some("380671234567"));
}

#[tokio::test]
async fn lookup_phone_failure_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/popup"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let phone = lookup_phone(
        &fetcher(3),
        &format!("{}/popup", server.uri()),
        "https://auto.ria.com/uk/auto_bmw_x5_35012345.html",
        &meta(),
    )
    .await;
    assert!(phone.is_none());
}
