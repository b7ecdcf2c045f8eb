use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Per-attempt request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default retry budget for 429s and network errors.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Ceiling for exponential backoff waits.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Errors from the GraphQL transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("parse error: {0}")]
    Parse(String),
}

/// GraphQL POST transport with rate-limit compliance.
///
/// 429 responses honor `Retry-After` when present, otherwise an
/// exponential backoff schedule (base 2 s, doubling, capped). Network
/// errors retry on the same schedule; any other non-success status
/// propagates immediately.
pub struct GraphQlTransport {
    http: Client,
    api_url: String,
    max_retries: u32,
}

impl GraphQlTransport {
    pub fn new(api_url: impl Into<String>, max_retries: u32) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            max_retries,
        })
    }

    /// Issue one GraphQL request, retrying through rate limits and
    /// transient network failures.
    pub async fn request(
        &self,
        query: &str,
        variables: Value,
        token: Option<&str>,
    ) -> Result<Value, TransportError> {
        for attempt in 0..self.max_retries {
            let mut req = self
                .http
                .post(&self.api_url)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::ACCEPT, "application/json")
                .json(&serde_json::json!({
                    "query": query,
                    "variables": variables,
                }));
            if let Some(token) = token {
                req = req.bearer_auth(token);
            }

            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if attempt + 1 == self.max_retries {
                        return Err(e.into());
                    }
                    let wait = backoff_delay(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "network error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
            };

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let wait = retry_after_delay(retry_after.as_deref(), attempt);
                tracing::warn!(
                    attempt,
                    wait_secs = wait.as_secs(),
                    "rate limited (429), backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), "API error response");
                return Err(TransportError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            return resp
                .json::<Value>()
                .await
                .map_err(|e| TransportError::Parse(e.to_string()));
        }

        Err(TransportError::RetriesExhausted {
            attempts: self.max_retries,
        })
    }
}

/// Exponential backoff schedule: 2 s base, doubling per attempt, capped.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = match attempt {
        0..=4 => 2u64 << attempt,
        _ => MAX_BACKOFF.as_secs(),
    };
    Duration::from_secs(secs.min(MAX_BACKOFF.as_secs()))
}

/// Wait before retrying a 429: an integer `Retry-After` header wins,
/// anything else falls back to the backoff schedule.
pub fn retry_after_delay(retry_after: Option<&str>, attempt: u32) -> Duration {
    match retry_after.and_then(|v| v.trim().parse::<u64>().ok()) {
        Some(secs) => Duration::from_secs(secs),
        None => backoff_delay(attempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_two_seconds() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(2), Duration::from_secs(8));
        assert_eq!(backoff_delay(3), Duration::from_secs(16));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(10), Duration::from_secs(60));
        assert_eq!(backoff_delay(63), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_header_wins() {
        assert_eq!(retry_after_delay(Some("1"), 3), Duration::from_secs(1));
        assert_eq!(retry_after_delay(Some(" 7 "), 0), Duration::from_secs(7));
    }

    #[test]
    fn test_retry_after_garbage_falls_back_to_backoff() {
        assert_eq!(retry_after_delay(Some("soon"), 1), Duration::from_secs(4));
        assert_eq!(retry_after_delay(None, 0), Duration::from_secs(2));
    }
}
