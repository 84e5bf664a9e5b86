//! Mock implementations for testing without hardware.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPanel`] | [`EpaperPanel`] | Records every driver call in order |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//!
//! # Example
//!
//! ```rust
//! use epaper_frame::hal::{MockPanel, PanelCall};
//! use epaper_frame::traits::EpaperPanel;
//!
//! let mut panel = MockPanel::new();
//! panel.init().unwrap();
//! panel.clear().unwrap();
//! panel.sleep().unwrap();
//!
//! assert_eq!(panel.calls, vec![PanelCall::Init, PanelCall::Clear, PanelCall::Sleep]);
//! assert_eq!(panel.clear_count(), 1);
//! ```
//!
//! [`EpaperPanel`]: crate::traits::EpaperPanel
//! [`Clock`]: crate::traits::Clock

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::render::Bitmap;
use crate::traits::{Clock, EpaperPanel};

// ============================================================================
// Panel Mock
// ============================================================================

/// A driver call recorded by [`MockPanel`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PanelCall {
    /// `init()`
    Init,
    /// `clear()`
    Clear,
    /// `draw()` with the frame that was pushed.
    Draw(Bitmap),
    /// `sleep()`
    Sleep,
}

/// Mock e-paper panel.
///
/// Records every call in order so tests can check both what was shown and
/// that each refresh followed the `init → op → sleep` sequence. Calls that
/// arrive while another refresh is still open are counted in `overlaps`.
///
/// # Example
///
/// ```rust
/// use epaper_frame::hal::MockPanel;
/// use epaper_frame::render::Bitmap;
/// use epaper_frame::traits::EpaperPanel;
///
/// let mut panel = MockPanel::new();
/// panel.fail_draws = true;
///
/// panel.init().unwrap();
/// assert!(panel.draw(&Bitmap::white(250, 122)).is_err());
/// ```
#[derive(Debug)]
pub struct MockPanel {
    /// Every call in order.
    pub calls: Vec<PanelCall>,
    /// Panel size reported by `dimensions()`.
    pub size: (u32, u32),
    /// Make every `draw()` fail with a device error.
    pub fail_draws: bool,
    /// Make every `init()` fail with a device error.
    pub fail_init: bool,
    /// Time each `draw()`/`clear()` blocks for, to widen race windows.
    pub refresh_delay: Option<StdDuration>,
    /// Number of `init()` calls made while a previous refresh was still open.
    pub overlaps: usize,
    awake: bool,
}

impl Default for MockPanel {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            size: (250, 122),
            fail_draws: false,
            fail_init: false,
            refresh_delay: None,
            overlaps: 0,
            awake: false,
        }
    }
}

impl MockPanel {
    /// Creates a 250x122 mock panel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock panel of the given size.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ..Self::default()
        }
    }

    /// Makes each refresh block for `delay`.
    pub fn with_refresh_delay(mut self, delay: StdDuration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    /// Number of frames drawn.
    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, PanelCall::Draw(_)))
            .count()
    }

    /// Number of clears.
    pub fn clear_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, PanelCall::Clear))
            .count()
    }

    /// The most recently drawn frame.
    pub fn last_frame(&self) -> Option<&Bitmap> {
        self.calls.iter().rev().find_map(|c| match c {
            PanelCall::Draw(frame) => Some(frame),
            _ => None,
        })
    }

    /// Whether `init()` has been called without a matching `sleep()`.
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    fn pause(&self) {
        if let Some(delay) = self.refresh_delay {
            std::thread::sleep(delay);
        }
    }
}

impl EpaperPanel for MockPanel {
    type Error = &'static str;

    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.awake {
            self.overlaps += 1;
        }
        self.calls.push(PanelCall::Init);
        if self.fail_init {
            return Err("mock init failure");
        }
        self.awake = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.calls.push(PanelCall::Clear);
        self.pause();
        Ok(())
    }

    fn draw(&mut self, frame: &Bitmap) -> Result<(), Self::Error> {
        self.calls.push(PanelCall::Draw(frame.clone()));
        self.pause();
        if self.fail_draws {
            return Err("mock draw failure");
        }
        Ok(())
    }

    fn sleep(&mut self) -> Result<(), Self::Error> {
        self.calls.push(PanelCall::Sleep);
        self.awake = false;
        Ok(())
    }
}

// ============================================================================
// Clock Mock
// ============================================================================

/// Mock clock for testing.
///
/// Clones share the same time, so a test can keep one handle while the
/// controller owns another.
///
/// # Example
///
/// ```rust
/// use chrono::Duration;
/// use epaper_frame::hal::MockClock;
/// use epaper_frame::traits::Clock;
///
/// let clock = MockClock::new();
/// let handle = clock.clone();
/// let start = clock.now();
///
/// handle.advance(Duration::seconds(10));
/// assert_eq!(clock.now() - start, Duration::seconds(10));
/// ```
#[derive(Clone, Debug)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Creates a clock fixed at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }

    /// Creates a clock fixed at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Moves time forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Tests
// ============================================================================
