//! Retry policy shared by the embedding and generation gateways.
//!
//! Each attempt runs under a timeout. Transient failures (timeouts, network
//! errors, HTTP 429 and 5xx) are retried with exponential backoff; permanent
//! failures (other 4xx, malformed responses) stop immediately.
//!
//! Backoff doubles from `initial_backoff` and is capped at `max_backoff`:
//! with the embedding defaults that is 500ms, 1s, 2s, ... up to 8s.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Outcome of a single failed call to an external service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Permanent(String),
}

impl CallError {
    /// Classify a non-success HTTP status.
    pub fn from_status(service: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("{} API error {}: {}", service, status, body);
        if status.as_u16() == 429 || status.is_server_error() {
            CallError::Transient(message)
        } else {
            CallError::Permanent(message)
        }
    }

    /// Classify a transport-level failure. Connection problems and timeouts
    /// are worth retrying; anything else (e.g. a body we cannot decode) is not.
    pub fn from_reqwest(service: &str, err: reqwest::Error) -> Self {
        let message = format!("{} request failed: {}", service, err);
        if err.is_timeout() || err.is_connect() || err.is_request() {
            CallError::Transient(message)
        } else {
            CallError::Permanent(message)
        }
    }
}

/// Error returned once a call has failed for good.
#[derive(Debug, Clone, Error)]
#[error("{last_error} (after {attempts} attempt(s))")]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: String,
}

/// Bounded exponential backoff with a per-attempt timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: Duration::from_secs(8),
            timeout,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(CallError::Transient(format!(
                    "{} timed out after {}ms",
                    label,
                    self.timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(CallError::Permanent(message)) => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: message,
                    });
                }
                Err(CallError::Transient(message)) => {
                    if attempt >= self.max_attempts {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last_error: message,
                        });
                    }
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        call = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_secs(5))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy::new(5, Duration::from_millis(500), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_secs(1));
        assert_eq!(p.backoff(3), Duration::from_secs(2));
        assert_eq!(p.backoff(6), Duration::from_secs(8));
        assert_eq!(p.backoff(40), Duration::from_secs(8));
    }

    #[test]
    fn test_zero_attempts_normalised() {
        assert_eq!(fast(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = fast(3)
            .run("test", || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CallError::Transient("503".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = fast(3)
            .run("test", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(CallError::Permanent("400 bad request".into()))
                }
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let err = fast(3)
            .run("test", || async {
                Err::<(), _>(CallError::Transient("429 rate limited".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(err.last_error.contains("429"));
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(20));
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = policy
            .run("slow", || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, CallError>(())
                }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(err.last_error.contains("timed out"));
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;
        assert!(matches!(
            CallError::from_status("x", StatusCode::TOO_MANY_REQUESTS, ""),
            CallError::Transient(_)
        ));
        assert!(matches!(
            CallError::from_status("x", StatusCode::BAD_GATEWAY, ""),
            CallError::Transient(_)
        ));
        assert!(matches!(
            CallError::from_status("x", StatusCode::UNAUTHORIZED, ""),
            CallError::Permanent(_)
        ));
    }
}
