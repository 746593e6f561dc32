//! Exponential backoff retry for advisor calls.
//!
//! Only transient errors (`rate_limit`, `timeout`, `server_error`) are
//! retried; everything else surfaces immediately. Delays follow the policy's
//! exponential backoff, except when the provider supplies its own
//! `retry_after_ms` hint.

use std::future::Future;
use std::time::Duration;

use patchflow_types::advisor::{AdvisorError, RetryPolicy};

/// Run `call` with retries per `policy`.
///
/// `call` receives the 0-based attempt number. At most
/// `policy.max_retries` retries follow the initial call.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, AdvisorError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AdvisorError>>,
{
    let mut attempt = 0u32;
    loop {
        match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < policy.max_retries => {
                let delay_ms = match &error {
                    AdvisorError::RateLimited {
                        retry_after_ms: Some(hint),
                    } => (*hint).min(policy.max_delay_ms),
                    _ => policy.delay_ms(attempt),
                };
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms,
                    %error,
                    "advisor call failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            max_parse_retries: 2,
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&fast_policy(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AdvisorError>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = run_with_retry(&fast_policy(), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(AdvisorError::Timeout)
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = run_with_retry(&fast_policy(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AdvisorError::Server {
                    message: "503".to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(AdvisorError::Server { .. })));
        // initial call + 3 retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_surfaces_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, _> = run_with_retry(&fast_policy(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AdvisorError::Parse("not json".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(AdvisorError::Parse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
