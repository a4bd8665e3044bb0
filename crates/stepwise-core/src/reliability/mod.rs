//! Retry/throttle absorption for Workflow Service calls. Two fixed
//! policies, no exponential backoff, no jitter, no circuit breaker: the
//! interval and retry bound are pinned explicitly rather than configurable.

use std::time::Duration;

use tracing::{debug, warn};

use crate::service::ServiceError;

/// How long a throttled worker sleeps before retrying the same operation.
pub const THROTTLE_SLEEP: Duration = Duration::from_secs(5);

/// Runs `operation` under the following absorption rules:
///
/// - `Throttling` ⇒ sleep [`THROTTLE_SLEEP`] and retry indefinitely.
/// - `UnknownResource` ⇒ retry once, immediately, after logging.
/// - `AlreadyExists` ⇒ swallowed, returns `Ok(())`-shaped success via `on_already_exists`.
/// - anything else ⇒ propagated to the caller, ending the current iteration.
pub async fn absorb_retriable<T, F, Fut>(mut operation: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let mut retried_unknown_resource = false;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(ServiceError::Throttling(reason)) => {
                warn!(reason, sleep_secs = THROTTLE_SLEEP.as_secs(), "throttled, retrying");
                tokio::time::sleep(THROTTLE_SLEEP).await;
            }
            Err(ServiceError::UnknownResource(reason)) if !retried_unknown_resource => {
                debug!(reason, "unknown resource, retrying once");
                retried_unknown_resource = true;
            }
            Err(other) => return Err(other),
        }
    }
}

/// Calls a registration operation (`registerDomain`/`registerWorkflowType`/
/// `registerActivityType`) and swallows `AlreadyExists`.
pub async fn register_idempotent<F, Fut>(operation: F) -> Result<(), ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), ServiceError>>,
{
    match operation().await {
        Ok(()) => Ok(()),
        Err(ServiceError::AlreadyExists(name)) => {
            debug!(name, "already registered, ignoring");
            Ok(())
        }
        Err(other) => Err(other),
    }
}
