//! Timeout validation utilities for browser operations

use std::time::Duration;

use crate::render::RenderError;

/// Maximum timeout for browser navigation operations (5 minutes)
/// Covers slow-loading listings, heavy SPAs, and network delays
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000; // 5 minutes

/// Default navigation budget: DOM parsed and network near-idle within 90 seconds
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 90_000;

/// Validate timeout for navigation operations
///
/// # Arguments
/// * `timeout_ms` - Optional timeout in milliseconds
/// * `default_ms` - Default timeout if None provided
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(RenderError)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
///
/// # Example
/// ```rust
/// use shopchain_scan::utils::validate_navigation_timeout;
///
/// let timeout = validate_navigation_timeout(Some(45_000), 90_000).unwrap();
/// assert_eq!(timeout.as_secs(), 45);
/// ```
pub fn validate_navigation_timeout(
    timeout_ms: Option<u64>,
    default_ms: u64,
) -> Result<Duration, RenderError> {
    let ms = timeout_ms.unwrap_or(default_ms);

    if ms == 0 {
        return Err(RenderError::InvalidOptions(
            "Navigation timeout must be greater than zero".to_string(),
        ));
    }

    if ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(RenderError::InvalidOptions(format!(
            "Timeout cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_NAVIGATION_TIMEOUT_MS,
            MAX_NAVIGATION_TIMEOUT_MS / 60_000,
            ms,
            ms as f64 / 60_000.0
        )));
    }

    Ok(Duration::from_millis(ms))
}
