//! Best-effort side channel for audit writes.
//!
//! Some writes are "nice to have" (report artifacts, audit records) and
//! must not fail the operation that produced them. Routing them through
//! `best_effort` makes that distinction visible at the call site instead of
//! hiding it in an empty error arm: the failure is logged and the caller
//! continues.

use std::fmt::Display;

/// Await a fallible write, logging and swallowing any error.
///
/// Returns the value on success, `None` on failure. `what` names the
/// operation in the log line.
pub async fn best_effort<T, E, F>(what: &str, fut: F) -> Option<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(what, %error, "best-effort operation failed; continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_best_effort_passes_through_success() {
        let result = best_effort("noop", async { Ok::<_, String>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_best_effort_swallows_failure() {
        let result =
            best_effort("audit write", async { Err::<u32, _>("disk full".to_string()) }).await;
        assert_eq!(result, None);
    }
}
