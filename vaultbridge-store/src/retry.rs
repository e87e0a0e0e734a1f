//! Retry/backoff for the store: base delay 50ms, doubling,
//! `N` clamped to `[1, ∞)`, immediate exit on a non-retryable error.

use std::time::Duration;

use crate::error::{RetryError, StoreError};

const BASE_DELAY: Duration = Duration::from_millis(50);

/// Runs `op` up to `max_attempts` times (clamped to at least 1), sleeping
/// `50ms * 2^attempt` between retryable failures. Exits immediately on a
/// non-retryable error.
pub async fn with_backoff<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(RetryError { attempts: attempt, source: err }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_up_to_n_on_retryable_error() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StoreError::Locked)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_one_attempt_for_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(5, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StoreError::NotFound("x".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_on_later_attempt() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(StoreError::Locked)
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn clamps_zero_attempts_to_one() {
        let calls = AtomicU32::new(0);
        let _ = with_backoff(0, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(StoreError::Locked)
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
