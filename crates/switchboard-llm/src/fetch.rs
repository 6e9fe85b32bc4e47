//! Outbound HTTP with timeout, bounded retry, and cancellation
//!
//! Only transient network failures are retried. An HTTP status is a
//! definitive answer from the vendor and is returned as-is; the caller
//! decides whether to fall back.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use switchboard_config::GatewayConfig;
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;

/// Maximum number of error-body bytes kept in `LlmError::VendorHttp`
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Timeout and retry budget for one outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt timeout until response headers arrive
    pub timeout: Duration,
    /// Total attempts, at least 1
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound for any delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for RetryPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            timeout: config.request_timeout,
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), doubling each time
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Send a request, retrying transient failures
///
/// `build` is called once per attempt. The token is checked before
/// every attempt and raced against the request and the backoff sleep.
///
/// # Errors
///
/// Returns `LlmError::Cancelled` if the token fires, or
/// `LlmError::Transport` once the attempt budget is spent or on a
/// non-transient network error
pub async fn send_with_retry<F>(
    provider: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    build: F,
) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = tokio::time::timeout(policy.timeout, build().send()) => result,
        };

        let failure = match outcome {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) if is_transient(&e) => e.to_string(),
            Ok(Err(e)) => {
                tracing::error!(provider, attempt, error = %e, "upstream request failed");
                return Err(LlmError::transport(provider, e));
            }
            Err(_) => format!("no response within {}ms", policy.timeout.as_millis()),
        };

        if attempt >= policy.max_attempts {
            tracing::error!(provider, attempt, error = %failure, "upstream request failed, giving up");
            return Err(LlmError::transport(provider, format!("{failure} (after {attempt} attempts)")));
        }

        let delay = policy.backoff(attempt);
        tracing::warn!(
            provider,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %failure,
            "transient upstream failure, retrying"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LlmError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Network failures worth another attempt
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout() || e.is_request()
}

/// Pass a 2xx response through, or turn it into `VendorHttp`
///
/// The error body is read under the token and bounded by the policy
/// timeout; a stalled or broken body keeps whatever arrived.
///
/// # Errors
///
/// Returns `LlmError::Cancelled` if the token fires while the body is
/// read, otherwise `LlmError::VendorHttp` carrying the status and up to
/// 64 KiB of the body
pub async fn ensure_success(
    provider: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut response: Response,
) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = Vec::new();
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(LlmError::Cancelled),
        outcome = tokio::time::timeout(policy.timeout, read_capped(&mut response, &mut body)) => outcome,
    };

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(provider, error = %e, read = body.len(), "error body read failed, keeping partial body");
        }
        Err(_) => {
            tracing::debug!(provider, read = body.len(), "error body stalled, keeping partial body");
        }
    }
    let body = String::from_utf8_lossy(&body).into_owned();

    tracing::warn!(provider, status = status.as_u16(), "upstream returned error");

    Err(LlmError::VendorHttp {
        provider: provider.to_owned(),
        status: status.as_u16(),
        body,
    })
}

/// Append body chunks to `body` until it ends or reaches the cap
async fn read_capped(response: &mut Response, body: &mut Vec<u8>) -> Result<(), reqwest::Error> {
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() >= MAX_ERROR_BODY {
            body.truncate(MAX_ERROR_BODY);
            break;
        }
    }
    Ok(())
}

/// Read and parse a JSON body, honoring cancellation
///
/// # Errors
///
/// Returns `LlmError::Cancelled`, `LlmError::Transport` if the body
/// cannot be read, or `LlmError::Decode` if it is not the expected JSON
pub async fn read_json<T: DeserializeOwned>(
    provider: &str,
    response: Response,
    cancel: &CancellationToken,
) -> Result<T, LlmError> {
    let bytes = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(LlmError::Cancelled),
        bytes = response.bytes() => bytes.map_err(|e| LlmError::transport(provider, e))?,
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::warn!(provider, error = %e, "unparseable upstream response body");
        LlmError::decode(provider, e)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(5),
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(1),
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(250));
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
        assert_eq!(policy.backoff(40), Duration::from_secs(1));
    }

    #[test]
    fn policy_from_gateway_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn cancelled_token_skips_io() {
        let client = reqwest::Client::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let attempts = AtomicU32::new(0);

        let result = send_with_retry("test", &fast_policy(3), &cancel, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            client.get("http://127.0.0.1:9/")
        })
        .await;

        assert!(matches!(result, Err(LlmError::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connect_failures_are_retried_up_to_budget() {
        // Bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let client = reqwest::Client::new();
        let attempts = AtomicU32::new(0);

        let result = send_with_retry("test", &fast_policy(3), &CancellationToken::new(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            client.get(format!("http://127.0.0.1:{port}/"))
        })
        .await;

        assert!(matches!(result, Err(LlmError::Transport { ref message, .. }) if message.contains("after 3 attempts")));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
