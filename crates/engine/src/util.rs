use api_client::ApiError;
use std::future::Future;
use std::time::Duration;

/// Runs one exchange call with an upper bound on its duration, so a hung
/// request surfaces as `ApiError::Timeout` instead of stalling the caller.
pub async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_secs = limit.as_secs(), "Exchange call timed out.");
            Err(ApiError::Timeout(operation.to_string()))
        }
    }
}
