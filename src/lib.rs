//! # epaper-frame
//!
//! Controller for a small e-paper picture frame that shows drawings sent
//! over MQTT, rotating through a persistent queue and falling back to a QR
//! code when the queue is empty.
//!
//! ## Features
//!
//! - **Persistent queue**: drawings live in SQLite and survive restarts
//! - **QR fallback**: a replaceable image shown whenever nothing is queued
//! - **Rotation**: each drawing is held for a minimum time, then replaced
//! - **Serialized panel access**: commands and rotation ticks never overlap
//!   a panel refresh
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Panel and clock abstractions
//! - `commands` - Command types and topic parsing
//! - `store` - Drawing queue and QR image slot
//! - `render` - Image decode, letterboxing and 1-bit conversion
//! - `controller` - State machine that ties everything together
//! - `coordinator` - Mutex wrapper shared by the services
//! - `hal` - Concrete panels and clocks (mock for testing, PNG for desktop)
//! - `services` - MQTT intake and rotation timer (`mqtt` feature)
//!
//! ## Example
//!
//! ```rust
//! use chrono::Duration;
//! use epaper_frame::{
//!     Command, DisplayController, SystemState,
//!     hal::{MockClock, MockPanel},
//!     store::{DrawingStore, QrSlot},
//! };
//!
//! let dir = tempfile::tempdir().unwrap();
//! let clock = MockClock::new();
//! let mut controller = DisplayController::new(
//!     MockPanel::new(),
//!     DrawingStore::open_in_memory().unwrap(),
//!     QrSlot::new(dir.path().join("qr.png")),
//!     clock.clone(),
//!     Duration::seconds(30),
//! );
//! controller.start();
//!
//! // A drawing that arrives before any QR image waits in the queue
//! controller.apply_command(Command::parse("image/add/1", b"...").unwrap()).unwrap();
//! assert_eq!(controller.state(), SystemState::Startup);
//! assert!(controller.store().has_available().unwrap());
//! ```

#![warn(missing_docs)]

/// Reconnect backoff schedule.
pub mod backoff;
/// Command types and topic parsing.
pub mod commands;
/// Configuration file and environment overrides.
pub mod config;
/// Display state machine.
pub mod controller;
/// Mutex wrapper that serializes controller access.
pub mod coordinator;
/// Error types.
pub mod error;
/// Panel and clock implementations, including test doubles.
pub mod hal;
/// Image decoding and frame preparation.
pub mod render;
/// Persistent drawing queue and QR image.
pub mod store;
/// Core traits for hardware abstraction.
pub mod traits;

/// MQTT intake and rotation timer (feature-gated).
#[cfg(feature = "mqtt")]
pub mod services;

// Re-exports for convenience
pub use backoff::Backoff;
pub use commands::{Command, CommandOutcome};
pub use controller::{DisplayController, SystemState, TickOutcome};
pub use coordinator::Coordinator;
pub use error::{CommandError, ConfigError, DisplayError, StoreError, TransportError};
pub use render::{Bitmap, Renderer};
pub use store::{Drawing, DrawingId, DrawingStore, QrSlot, QueueCounts};
pub use traits::{Clock, EpaperPanel, SystemClock};

// Config re-exports
pub use config::{
    Config, DisplayConfig, LoggingConfig, MqttConfig, RotationConfig, StorageConfig,
};
