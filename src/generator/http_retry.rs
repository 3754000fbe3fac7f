//! HTTP retry with exponential backoff for model API calls.
//!
//! 429 and 5xx responses and timeouts/connection failures are retried.
//! 401/403 are surfaced as [`crate::Error::Unauthorized`] without retrying,
//! other 4xx responses fail immediately.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Longest response body echoed into an error message
const MAX_ERROR_BODY: usize = 300;

/// Upper bound on a server-supplied `Retry-After`
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Retry budget for one logical request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.min(16))
    }
}

fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Send an HTTP request with retry and exponential backoff.
///
/// Retry behavior (with the default 1s base delay):
/// - 429 (rate limited): `Retry-After` if present (capped at 60s), else 2s, 4s, 8s
/// - 5xx (server error): backoff 1s, 2s, 4s
/// - Timeout/connect error: backoff 1s, 2s, 4s
/// - 401/403: `Error::Unauthorized`, no retry
/// - Other 4xx: `Error::Service`, no retry
pub async fn send_with_retry<F>(
    client: &Client,
    build_request: F,
    policy: &RetryPolicy,
    context: &str,
) -> crate::Result<Response>
where
    F: Fn(&Client) -> RequestBuilder,
{
    let mut last_error = format!("{}: no attempts made", context);

    for attempt in 0..policy.max_attempts {
        let delay = match build_request(client).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp);
                } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Err(crate::Error::Unauthorized(format!(
                        "{}: credentials rejected ({})",
                        context, status
                    )));
                } else if status == StatusCode::TOO_MANY_REQUESTS {
                    let delay = retry_after(&resp).unwrap_or_else(|| policy.backoff(attempt + 1));
                    warn!("{}: rate limited (429), retrying in {:?}", context, delay);
                    last_error = format!("{}: rate limited (429)", context);
                    delay
                } else if status.is_server_error() {
                    let delay = policy.backoff(attempt);
                    warn!("{}: server error ({}), retrying in {:?}", context, status, delay);
                    last_error = format!("{}: server error ({})", context, status);
                    delay
                } else {
                    let body = resp.text().await.unwrap_or_default();
                    warn!("{}: non-retriable error ({})", context, status);
                    return Err(crate::Error::Service(format!(
                        "{}: non-retriable error ({}) {}",
                        context,
                        status,
                        truncate(body.trim())
                    )));
                }
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                let delay = policy.backoff(attempt);
                warn!("{}: network error ({}), retrying in {:?}", context, e, delay);
                last_error = format!("{}: network error ({})", context, e);
                delay
            }
            Err(e) => {
                warn!("{}: request failed: {}", context, e);
                return Err(crate::Error::Service(format!("{}: request failed: {}", context, e)));
            }
        };

        if attempt + 1 < policy.max_attempts {
            tokio::time::sleep(delay).await;
        }
    }

    warn!("{}: failed after {} attempts", context, policy.max_attempts);
    Err(crate::Error::Service(last_error))
}
