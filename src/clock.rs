//! Wall-clock helpers for snapshot timestamps.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    unix_millis(SystemTime::now())
}

/// Project a monotonic instant onto the wall clock for display.
pub fn instant_to_millis(at: Instant) -> u64 {
    let now = Instant::now();
    let wall = if at <= now {
        SystemTime::now() - now.duration_since(at)
    } else {
        SystemTime::now() + at.duration_since(now)
    };
    unix_millis(wall)
}

/// Duration as whole milliseconds.
pub fn as_millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
