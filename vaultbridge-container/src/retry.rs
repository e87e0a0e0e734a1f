//! Retry/backoff for the container client: base delay
//! 100ms, doubling, up to 3 attempts by default, cancellation-aware.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ContainerError;

const BASE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub async fn with_backoff<T, F, Fut>(
    max_attempts: u32,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, ContainerError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ContainerError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = BASE_DELAY * 2u32.saturating_pow(attempt - 1);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(ContainerError::Cancelled),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_up_to_default_max() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = with_backoff(DEFAULT_MAX_ATTEMPTS, &cancel, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ContainerError::Timeout)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_retryable_error_exits_immediately() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = with_backoff(5, &cancel, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ContainerError::Auth("no".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
