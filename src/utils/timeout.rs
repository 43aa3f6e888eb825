//! Timeout validation utilities for element waits

use std::time::Duration;

use crate::utils::errors::{ElementError, ElementResult};

/// Maximum explicit or implicit wait for a single lookup (5 minutes)
pub const MAX_LOOKUP_WAIT_SECS: u64 = 300;

/// Maximum total budget for a hide wait (30 minutes)
/// Loading masks on slow back-office pages can stay up for a long time
pub const MAX_HIDE_WAIT_SECS: u64 = 1_800;

/// Maximum poll interval (1 minute)
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Validate a lookup wait (explicit or implicit)
///
/// # Arguments
/// * `wait_secs` - Optional wait in seconds
/// * `default_secs` - Default wait if None provided
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(ElementError)` - If the wait exceeds MAX_LOOKUP_WAIT_SECS
pub fn validate_lookup_wait(wait_secs: Option<u64>, default_secs: u64) -> ElementResult<Duration> {
    let secs = wait_secs.unwrap_or(default_secs);

    if secs > MAX_LOOKUP_WAIT_SECS {
        return Err(ElementError::InvalidBudget(format!(
            "Lookup wait cannot exceed {}s ({} minutes). Received: {}s",
            MAX_LOOKUP_WAIT_SECS,
            MAX_LOOKUP_WAIT_SECS / 60,
            secs
        )));
    }

    Ok(Duration::from_secs(secs))
}

/// Validate the total budget of a hide wait
pub fn validate_hide_wait(wait_secs: Option<u64>, default_secs: u64) -> ElementResult<Duration> {
    let secs = wait_secs.unwrap_or(default_secs);

    if secs > MAX_HIDE_WAIT_SECS {
        return Err(ElementError::InvalidBudget(format!(
            "Hide wait cannot exceed {}s ({} minutes). Received: {}s ({:.1} minutes)",
            MAX_HIDE_WAIT_SECS,
            MAX_HIDE_WAIT_SECS / 60,
            secs,
            secs as f64 / 60.0
        )));
    }

    Ok(Duration::from_secs(secs))
}

/// Validate a poll interval; zero is rejected so no poll loop can spin
pub fn validate_poll_interval(interval_ms: u64) -> ElementResult<Duration> {
    if interval_ms == 0 {
        return Err(ElementError::InvalidBudget(
            "Poll interval must be greater than zero".to_string(),
        ));
    }

    if interval_ms > MAX_POLL_INTERVAL_MS {
        return Err(ElementError::InvalidBudget(format!(
            "Poll interval cannot exceed {}ms. Received: {}ms",
            MAX_POLL_INTERVAL_MS, interval_ms
        )));
    }

    Ok(Duration::from_millis(interval_ms))
}
