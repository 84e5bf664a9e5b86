//! Display abstraction for low-refresh-rate e-paper panels.
//!
//! This module defines the [`EpaperPanel`] trait. The controller never calls
//! it directly from more than one thread: every frame goes through the
//! coordinator's single lock as an `init → draw → sleep` sequence.

use crate::render::Bitmap;

/// Driver contract for a 1-bit e-paper panel.
///
/// Implementors wrap the physical driver (SPI panel), a simulated panel
/// that writes frames to disk, or a mock for testing.
///
/// # Example
///
/// ```ignore
/// use epaper_frame::traits::EpaperPanel;
/// use epaper_frame::render::Bitmap;
///
/// struct MyPanel { /* ... */ }
///
/// impl EpaperPanel for MyPanel {
///     type Error = std::io::Error;
///
///     fn dimensions(&self) -> (u32, u32) { (250, 122) }
///     fn init(&mut self) -> Result<(), Self::Error> { Ok(()) }
///     fn clear(&mut self) -> Result<(), Self::Error> { Ok(()) }
///     fn draw(&mut self, frame: &Bitmap) -> Result<(), Self::Error> {
///         // Shift frame.data() out over SPI
///         Ok(())
///     }
///     fn sleep(&mut self) -> Result<(), Self::Error> { Ok(()) }
/// }
/// ```
pub trait EpaperPanel {
    /// Error type for device operations.
    type Error: core::fmt::Display;

    /// Panel size in pixels as `(width, height)` in landscape orientation.
    fn dimensions(&self) -> (u32, u32);

    /// Wakes the panel and prepares it for a refresh.
    ///
    /// Called before every draw or clear since the panel is put to sleep
    /// after each refresh.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Clears the panel to white.
    fn clear(&mut self) -> Result<(), Self::Error>;

    /// Pushes a full frame to the panel.
    ///
    /// `frame` is already scaled, rotated and packed for this panel.
    fn draw(&mut self, frame: &Bitmap) -> Result<(), Self::Error>;

    /// Puts the panel into deep sleep. The image stays visible.
    fn sleep(&mut self) -> Result<(), Self::Error>;
}
