// SPDX-License-Identifier: MPL-2.0

//! Utility functions shared by the pipeline stages

use std::future::Future;
use std::time::Duration;
use tokio::time::error::Elapsed;

/// Await `future`, bounded by `limit` when one is configured
///
/// Every suspension point of the pipeline goes through here so a timeout
/// can be configured per stage without touching the stage itself.
pub async fn with_timeout<F>(limit: Option<Duration>, future: F) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await,
        None => Ok(future.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_without_limit_awaits_to_completion() {
        let value = with_timeout(None, async { 7 }).await;
        assert_eq!(value.ok(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_elapses() {
        let result = with_timeout(
            Some(Duration::from_millis(10)),
            tokio::time::sleep(Duration::from_secs(60)),
        )
        .await;
        assert!(result.is_err());
    }
}
