//! Reconnect delay schedule.

use std::time::Duration;

/// Exponential backoff: `first`, `first * rate`, `first * rate²`, ...,
/// capped at `max`. Reset after a successful connection.
///
/// ```rust
/// use std::time::Duration;
/// use epaper_frame::Backoff;
///
/// let mut backoff = Backoff::new(Duration::from_secs(1), 2, Duration::from_secs(5));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(1));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(2));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(4));
/// assert_eq!(backoff.next_delay(), Duration::from_secs(5));
///
/// backoff.reset();
/// assert_eq!(backoff.next_delay(), Duration::from_secs(1));
/// ```
#[derive(Clone, Debug)]
pub struct Backoff {
    first: Duration,
    rate: u32,
    max: Duration,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    /// Creates a schedule. A `rate` below 1 is treated as 1.
    pub fn new(first: Duration, rate: u32, max: Duration) -> Self {
        Self {
            first,
            rate: rate.max(1),
            max,
            current: first.min(max),
            attempts: 0,
        }
    }

    /// Delay before the next attempt. Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(self.rate)
            .map_or(self.max, |next| next.min(self.max));
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Back to the first delay.
    pub fn reset(&mut self) {
        self.current = self.first.min(self.max);
        self.attempts = 0;
    }
}
