//! Linear backoff between retry attempts.

use std::time::Duration;

/// Delay before retry number `attempt` (1-based): `attempt * step`.
///
/// Attempt 0 is the initial request and has no delay.
pub fn linear_backoff(attempt: u32, step: Duration) -> Duration {
    step.saturating_mul(attempt)
}
