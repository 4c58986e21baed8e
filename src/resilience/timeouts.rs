//! Timeout enforcement.
//!
//! # Responsibilities
//! - Track the overall per-request deadline across retries
//! - Hand each attempt the time that is left
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities per attempt, sized by `remaining()`
//! - Once the deadline passes no further attempt starts

use std::time::{Duration, Instant};

/// Overall time budget of one proxied request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}
