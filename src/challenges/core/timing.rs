//! Poll timing rules.
//!
//! The clearance loop runs on fixed intervals: a floored overall deadline, a
//! constant backoff between probes, and a throttle on "still waiting"
//! notifications.

use std::time::Duration;

use tokio::time::Instant;

/// Shortest deadline a run may have, whatever the caller asks for.
pub const MIN_CLEARANCE_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Pause between two blocked probes.
pub const PROBE_BACKOFF: Duration = Duration::from_millis(1_500);
/// Minimum spacing between two waiting notifications.
pub const NOTIFY_INTERVAL: Duration = Duration::from_millis(5_000);

/// Requested timeout with the floor applied.
pub fn effective_timeout(requested: Duration) -> Duration {
    requested.max(MIN_CLEARANCE_TIMEOUT)
}

/// Deadlines further out than this are treated as "never".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Absolute deadline for a run starting at `started`.
pub fn deadline_from(started: Instant, requested: Duration) -> Instant {
    started + effective_timeout(requested).min(FAR_FUTURE)
}

/// Gate that lets a notification through at most once per interval.
#[derive(Debug, Clone)]
pub struct NotificationThrottle {
    interval: Duration,
    last_notified: Option<Instant>,
}

impl NotificationThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_notified: None,
        }
    }

    /// Returns `true` and records `now` when the interval has elapsed since the
    /// last accepted notification. The first call always passes.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let due = self
            .last_notified
            .is_none_or(|last| now.saturating_duration_since(last) > self.interval);
        if due {
            self.last_notified = Some(now);
        }
        due
    }
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new(NOTIFY_INTERVAL)
    }
}
