//! Thread-safe access to the single [`DisplayController`].
//!
//! The message handler and the rotation timer both hold an
//! `Arc<Coordinator>`. Every operation takes the same lock for its whole
//! duration, panel refresh included, so a command and a tick can never
//! interleave their `init → draw → sleep` sequences.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Duration;
//! use epaper_frame::{
//!     Command, Coordinator, DisplayController, SystemState,
//!     hal::{MockClock, MockPanel},
//!     store::{DrawingStore, QrSlot},
//! };
//!
//! let dir = tempfile::tempdir().unwrap();
//! let controller = DisplayController::new(
//!     MockPanel::new(),
//!     DrawingStore::open_in_memory().unwrap(),
//!     QrSlot::new(dir.path().join("qr.png")),
//!     MockClock::new(),
//!     Duration::seconds(30),
//! );
//! let coordinator = Arc::new(Coordinator::new(controller));
//!
//! coordinator.apply_command(Command::SetBlanked(true)).unwrap();
//! assert_eq!(coordinator.state(), SystemState::Blanked);
//!
//! coordinator.shutdown();
//! assert!(coordinator.is_shut_down());
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::commands::{Command, CommandOutcome};
use crate::controller::{DisplayController, SystemState, TickOutcome};
use crate::error::StoreError;
use crate::store::DrawingId;
use crate::traits::{Clock, EpaperPanel};

/// Serializes every access to a [`DisplayController`].
///
/// Uses a plain `Mutex` rather than `RwLock`: nearly every operation
/// may refresh the panel, so there are no read-mostly paths worth sharing.
pub struct Coordinator<P: EpaperPanel, C: Clock> {
    controller: Mutex<DisplayController<P, C>>,
}

impl<P: EpaperPanel, C: Clock> Coordinator<P, C> {
    /// Wraps a controller.
    pub fn new(controller: DisplayController<P, C>) -> Self {
        Self {
            controller: Mutex::new(controller),
        }
    }

    /// Runs `f` with exclusive access to the controller.
    pub fn with_controller<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut DisplayController<P, C>) -> R,
    {
        f(&mut self.lock())
    }

    /// Applies a command under the lock.
    pub fn apply_command(&self, cmd: Command) -> Result<CommandOutcome, StoreError> {
        self.lock().apply_command(cmd)
    }

    /// Runs one rotation step under the lock.
    pub fn tick(&self) -> Result<TickOutcome, StoreError> {
        self.lock().tick()
    }

    /// Moves the controller to [`SystemState::Shutdown`].
    ///
    /// Waits for any refresh in progress to finish first.
    pub fn shutdown(&self) {
        self.lock().shutdown();
        info!("display controller shut down");
    }

    /// Current state.
    pub fn state(&self) -> SystemState {
        self.lock().state()
    }

    /// Id of the drawing on screen.
    pub fn last_shown(&self) -> Option<DrawingId> {
        self.lock().last_shown()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.state().is_terminal()
    }

    // A panic mid-refresh leaves the controller in a consistent state (the
    // worst case is a half-drawn panel), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, DisplayController<P, C>> {
        self.controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
