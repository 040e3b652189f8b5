//! Retry with exponential backoff for transient upstream failures.

use crate::error::ClientError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Base delay before the first retry
const BASE_BACKOFF_MS: u64 = 200;
/// Cap on a single backoff
const MAX_BACKOFF_MS: u64 = 5_000;

/// Run `f` until it succeeds, fails permanently, or `max_attempts` is spent.
///
/// Only errors for which `ClientError::is_transient` holds are retried.
pub async fn with_retry<F, Fut, T>(mut f: F, max_attempts: u32) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    with_retry_backoff(&mut f, max_attempts, BASE_BACKOFF_MS).await
}

async fn with_retry_backoff<F, Fut, T>(
    f: &mut F,
    max_attempts: u32,
    base_backoff_ms: u64,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_attempts && e.is_transient() => {
                let backoff_ms = (base_backoff_ms * 2_u64.pow(attempt - 1)).min(MAX_BACKOFF_MS);
                warn!(
                    "Upstream request failed (attempt {}/{}): {}. Retrying in {}ms",
                    attempt, max_attempts, e, backoff_ms
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> ClientError {
        ClientError::Transport {
            source_name: "test".to_string(),
            message: "connection reset".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_eventually() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = with_retry_backoff(
            &mut || {
                let count = counter.clone();
                async move {
                    if count.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
                        Err(transient())
                    } else {
                        Ok(42)
                    }
                }
            },
            3,
            1,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result: Result<(), _> = with_retry_backoff(
            &mut || {
                let count = counter.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(transient())
                }
            },
            3,
            1,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_decode_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result: Result<(), _> = with_retry(
            || {
                let count = counter.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(ClientError::Decode {
                        source_name: "test".to_string(),
                        message: "missing field".to_string(),
                    })
                }
            },
            3,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
