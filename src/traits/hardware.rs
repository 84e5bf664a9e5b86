//! Time source abstraction.

use chrono::{DateTime, Utc};

/// Wall-clock time source.
///
/// Drawing timestamps and hold-duration expiry both read time through this
/// trait so tests can step time forward instead of sleeping.
///
/// # Example
///
/// ```rust
/// use chrono::Duration;
/// use epaper_frame::traits::Clock;
/// use epaper_frame::hal::MockClock;
///
/// let clock = MockClock::new();
/// let start = clock.now();
///
/// clock.advance(Duration::seconds(30));
/// assert_eq!(clock.now() - start, Duration::seconds(30));
/// ```
pub trait Clock {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
