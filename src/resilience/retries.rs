//! Retry logic.
//!
//! # Responsibilities
//! - Bound the number of retries per request
//! - Compute the delay before each retry (linear backoff)
//! - Refuse a retry whose delay would run past the request deadline
//!
//! # Design Decisions
//! - Connection errors, timeouts and 5xx responses are retryable
//! - 4xx responses are returned to the caller as-is, never retried
//! - No retry budget: the per-request deadline bounds the total work

use std::time::Duration;
use axum::http::StatusCode;
use crate::resilience::backoff::linear_backoff;
use crate::resilience::timeouts::Deadline;

/// Retry bounds for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Linear backoff step.
    pub step: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, step: Duration) -> Self {
        Self { max_retries, step }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        linear_backoff(retry, self.step)
    }

    /// Delay before retry number `retry`, or `None` if the retry is not allowed:
    /// out of retries, or the deadline would expire before the retry starts.
    pub fn next_delay(&self, retry: u32, deadline: &Deadline) -> Option<Duration> {
        if retry > self.max_retries {
            return None;
        }
        let delay = self.delay_for(retry);
        if delay >= deadline.remaining() {
            return None;
        }
        Some(delay)
    }
}

/// Whether an upstream status should be treated as a failed attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
}
