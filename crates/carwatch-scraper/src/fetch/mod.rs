//! Fetch layer: politeness jitter, header rotation, and retry with backoff.
//!
//! Callers always get text back. Network and HTTP failures collapse to an
//! empty string after being logged, so one unreachable page never aborts a
//! crawl. The layer has no concurrency limit of its own; the pipeline's
//! worker count bounds in-flight requests.

mod retry;

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;

use crate::error::ScraperError;

pub use retry::{classify_status, FetchOutcome, FetchPolicy, RETRYABLE_STATUSES};

pub(crate) const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

pub(crate) const ACCEPT_LANGUAGE: &str = "uk-UA,uk;q=0.9,en;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Source of page text. Implemented over HTTP by [`HttpFetcher`] and by
/// in-memory fakes in tests.
#[async_trait]
pub trait PageFetch: Send + Sync {
    /// Fetches `url`, sending `body` as JSON when present.
    /// Returns an empty string when the page could not be retrieved.
    async fn fetch(&self, url: &str, method: Method, body: Option<&serde_json::Value>) -> String;

    async fn get(&self, url: &str) -> String {
        self.fetch(url, Method::Get, None).await
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> String {
        self.fetch(url, Method::Post, Some(body)).await
    }
}

/// Picks one user agent from the rotation pool.
pub(crate) fn random_user_agent() -> &'static str {
    USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())]
}

/// reqwest-backed [`PageFetch`] shared by every role of a run.
pub struct HttpFetcher {
    client: Client,
    policy: FetchPolicy,
}

impl HttpFetcher {
    /// Builds a fetcher whose client enforces `policy.request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(policy: FetchPolicy) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(policy.request_timeout)
            .connect_timeout(policy.request_timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self { client, policy })
    }

    async fn attempt(
        &self,
        url: &str,
        method: Method,
        body: Option<&serde_json::Value>,
    ) -> FetchOutcome {
        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        request = request
            .header(reqwest::header::USER_AGENT, random_user_agent())
            .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return FetchOutcome::Retryable(format!("timeout: {e}")),
            Err(e) => return FetchOutcome::Retryable(format!("transport error: {e}")),
        };

        let status = response.status().as_u16();
        if status != 200 {
            return classify_status(status);
        }

        match response.text().await {
            Ok(text) => FetchOutcome::Body(text),
            Err(e) => FetchOutcome::Retryable(format!("body read error: {e}")),
        }
    }
}

#[async_trait]
impl PageFetch for HttpFetcher {
    async fn fetch(&self, url: &str, method: Method, body: Option<&serde_json::Value>) -> String {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 0..max_attempts {
            tokio::time::sleep(self.policy.jitter()).await;

            match self.attempt(url, method, body).await {
                FetchOutcome::Body(text) => return text,
                FetchOutcome::Fatal(status) => {
                    tracing::warn!(url, status, "fetch: non-retryable status; giving up");
                    return String::new();
                }
                FetchOutcome::Retryable(reason) => {
                    if attempt + 1 >= max_attempts {
                        tracing::warn!(url, attempt, reason = %reason, "fetch: retryable failure");
                        break;
                    }
                    let delay = self.policy.backoff_delay(attempt);
                    tracing::warn!(
                        url,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        reason = %reason,
                        "fetch: retryable failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        tracing::warn!(url, max_attempts, "fetch: exhausted retries");
        String::new()
    }
}
