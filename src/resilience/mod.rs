//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → circuit_breaker.rs (admission; fail fast while OPEN)
//!     → timeouts.rs (overall deadline for every attempt and backoff)
//!     → On failure: retries.rs (retry budget, linear backoff from backoff.rs)
//!     → circuit_breaker.rs (one success/failure recorded per request)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries happen inside one request; the breaker sees only the final outcome
//! - Breaker rejections are never retried

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSettings, BreakerState, CircuitBreaker, CircuitBreakerSnapshot};
pub use retries::RetryPolicy;
pub use timeouts::Deadline;
