//! Deadline racing for backend calls
//!
//! There is no cancellation token in this layer; a call is bounded by racing
//! it against a timer. When the timer wins the call's future is dropped and
//! the caller receives [`CommonError::Timeout`], which the retry executor
//! treats like a network failure.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{CommonError, CommonResult};

/// Race `future` against `duration`.
///
/// `operation` names the call in the resulting timeout error.
pub async fn with_timeout<Fut, T>(operation: &str, duration: Duration, future: Fut) -> CommonResult<T>
where
    Fut: Future<Output = CommonResult<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            debug!(operation, timeout_ms = duration.as_millis() as u64, "operation timed out");
            Err(CommonError::timeout(operation, duration))
        }
    }
}
