//! Bounded adapter calls

use std::future::Future;
use std::time::Duration;

use rcc_adapter::AdapterError;
use tokio::time::{timeout_at, Instant};

/// Run an adapter call, failing with `DeadlineExceeded` once `budget` elapses
pub(crate) async fn with_deadline<T, F>(budget: Duration, call: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    until(Instant::now() + budget, budget, call).await
}

/// Like [`with_deadline`], for several calls sharing one absolute deadline
pub(crate) async fn until<T, F>(deadline: Instant, budget: Duration, call: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    timeout_at(deadline, call)
        .await
        .unwrap_or(Err(AdapterError::DeadlineExceeded(budget)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_hits_deadline() {
        let result: Result<(), _> = with_deadline(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            result,
            Err(AdapterError::DeadlineExceeded(Duration::from_millis(50)))
        );
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result = with_deadline(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
