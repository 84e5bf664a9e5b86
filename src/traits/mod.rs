//! Trait definitions for the hardware the controller drives.
//!
//! These abstractions let the display state machine run against a real
//! e-paper panel, a PNG file on a desktop, or a mock in tests.
//!
//! # Submodules
//!
//! - `display`: e-paper panel driver contract
//! - `hardware`: wall-clock time source
//!
//! # Hardware Abstraction
//!
//! - [`EpaperPanel`]: init / clear / draw / sleep of a 1-bit panel
//! - [`Clock`]: UTC time source, so hold durations can be tested without sleeping

pub mod display;
pub mod hardware;

pub use display::*;
pub use hardware::*;
