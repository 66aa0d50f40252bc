// src/fetcher.rs
//
// HTTP Fetcher (component A): a thin GET-with-retry wrapper shared by the
// log directory loader and every per-log monitor.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

const MAX_RETRIES: u32 = 3;
const MAX_BACKOFF_SECS: u64 = 60;

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent("ct-tailer/1.0")
            .build()?;
        Ok(Self { client })
    }

    /// Issues `GET url` with up to `MAX_RETRIES` attempts, honoring 429
    /// `Retry-After` without consuming an attempt. Returns `None` once the
    /// retry budget is exhausted; the caller decides what that means.
    pub async fn fetch(&self, url: &str) -> Option<Response> {
        let mut attempt: u32 = 0;
        loop {
            if attempt >= MAX_RETRIES {
                warn!(url, attempt, "fetch exhausted retry budget");
                return None;
            }

            match self.client.get(url).send().await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = retry_after_wait(resp.headers().get("retry-after"))
                        .unwrap_or_else(|| backoff_for_attempt(attempt));
                    warn!(url, wait_secs = wait.as_secs(), "rate limited (429)");
                    tokio::time::sleep(wait).await;
                    // 429 does not consume an attempt.
                }
                Ok(resp) if resp.status().is_success() => {
                    return Some(resp);
                }
                Ok(resp) => {
                    debug!(url, status = %resp.status(), attempt, "non-success response");
                    tokio::time::sleep(backoff_for_attempt(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(url, %err, attempt, "transport error");
                    tokio::time::sleep(backoff_for_attempt(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// `min(2^attempt, 60)` seconds, the capped exponential backoff shared by
/// every failure path.
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Parses a `Retry-After` header value as a plain integer number of
/// seconds; any other shape is treated as absent (caller falls back to
/// the capped backoff).
pub fn retry_after_wait(header: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    let secs: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(secs))
}
