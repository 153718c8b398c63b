//! Fetch deadline wrapper.

use hs_history::HistoryError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Wrap a history or search future with a deadline. Exceeding it is a
/// transient error.
pub async fn with_timeout<T, F>(timeout_ms: u64, fut: F) -> Result<T, HistoryError>
where
    F: Future<Output = Result<T, HistoryError>>,
{
    match timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(HistoryError::Transient(format!(
            "no response within {timeout_ms}ms"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_future_is_transient() {
        let out: Result<(), HistoryError> = with_timeout(5, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(out, Err(HistoryError::Transient(_))));
    }

    #[tokio::test]
    async fn fast_future_passes_through() {
        let out = with_timeout(1_000, async { Ok::<_, HistoryError>(3) }).await;
        assert_eq!(out.unwrap(), 3);
    }
}
