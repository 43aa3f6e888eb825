//! Explicit-wait polling
//!
//! Provides poll_until() which re-runs a check on a fixed interval until it
//! yields a value or the timeout elapses. Element lookups, visibility and
//! invisibility waits are all built on it.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::utils::errors::{ElementError, ElementResult};

/// Poll `check` until it returns `Some`, an error, or `timeout` elapses
///
/// # Arguments
/// * `timeout` - Maximum time to wait; zero means exactly one check
/// * `interval` - Sleep between checks, never longer than the time left
/// * `what` - Description used in the timeout error
/// * `check` - Returns `Ok(Some(value))` when satisfied, `Ok(None)` to retry
///
/// # Returns
/// * `Ok(T)` - The check was satisfied
/// * `Err(ElementError::Timeout)` - Deadline reached without a value
/// * `Err(_)` - Any error from the check, unchanged
pub async fn poll_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    what: &str,
    mut check: F,
) -> ElementResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ElementResult<Option<T>>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = check().await? {
            debug!("{} satisfied after {} attempt(s)", what, attempts);
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            debug!("{} not satisfied after {} attempt(s)", what, attempts);
            return Err(ElementError::Timeout {
                what: what.to_string(),
                timeout,
            });
        }

        // Zero interval would spin; the remaining time bounds the last sleep
        let nap = interval.max(Duration::from_millis(1)).min(timeout - elapsed);
        tokio::time::sleep(nap).await;
    }
}
