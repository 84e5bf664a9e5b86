//! Display state machine.
//!
//! [`DisplayController`] owns the panel, the drawing queue and the QR slot,
//! and decides what is on screen. Every command and every rotation tick goes
//! through it, and every state change is one arm of a `match` on
//! [`SystemState`].
//!
//! # Example
//!
//! ```rust
//! use chrono::Duration;
//! use epaper_frame::{
//!     Command, CommandOutcome, DisplayController, SystemState,
//!     hal::{MockClock, MockPanel},
//!     store::{DrawingStore, QrSlot},
//! };
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut controller = DisplayController::new(
//!     MockPanel::new(),
//!     DrawingStore::open_in_memory().unwrap(),
//!     QrSlot::new(dir.path().join("qr.png")),
//!     MockClock::new(),
//!     Duration::seconds(30),
//! );
//! controller.start();
//! assert_eq!(controller.state(), SystemState::Startup);
//!
//! // Blanking works from any live state
//! let outcome = controller.apply_command(Command::SetBlanked(true)).unwrap();
//! assert_eq!(outcome, CommandOutcome::Displayed);
//! assert_eq!(controller.state(), SystemState::Blanked);
//! ```

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::commands::{Command, CommandOutcome};
use crate::error::{DisplayError, StoreError};
use crate::render::{Bitmap, Renderer};
use crate::store::{DrawingId, DrawingStore, QrSlot};
use crate::traits::{Clock, EpaperPanel};

/// What the frame is currently doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SystemState {
    /// Booted, nothing shown yet.
    #[default]
    Startup,
    /// Showing the QR fallback image.
    QrCode,
    /// Showing a drawing from the queue.
    Drawing,
    /// Panel cleared on request.
    Blanked,
    /// Terminal, everything is ignored.
    Shutdown,
}

impl SystemState {
    /// Whether the controller may move from `self` to `next`.
    ///
    /// Self-loops on `QrCode` and `Drawing` are allowed; they are redraws.
    pub fn can_transition_to(self, next: SystemState) -> bool {
        use SystemState::*;
        match (self, next) {
            (Shutdown, _) => false,
            (_, Shutdown) => true,
            (_, Startup) => false,
            (_, Blanked) => true,
            (Startup | QrCode | Drawing | Blanked, QrCode | Drawing) => true,
        }
    }

    /// Whether the state is `Shutdown`.
    pub fn is_terminal(self) -> bool {
        self == SystemState::Shutdown
    }
}

/// Result of one rotation tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not showing a drawing, nothing to rotate.
    Idle,
    /// The current drawing has not been up for the hold time yet.
    Holding {
        /// When the current drawing may be replaced.
        until: DateTime<Utc>,
    },
    /// The next queued drawing is now on screen.
    Advanced(DrawingId),
    /// Queue was empty, the QR image is now on screen.
    FellBack,
    /// The controller has shut down; the timer should stop.
    Stopped,
}

/// What replaced the current picture.
enum Replacement {
    Drawing(DrawingId),
    QrCode,
}

/// The display controller.
///
/// Not thread-safe on its own. Share it through
/// [`Coordinator`](crate::Coordinator), which serializes commands and ticks
/// so two panel refreshes can never interleave.
pub struct DisplayController<P: EpaperPanel, C: Clock> {
    panel: P,
    clock: C,
    renderer: Renderer,
    store: DrawingStore,
    qr: QrSlot,
    state: SystemState,
    last_shown: Option<DrawingId>,
    hold: Duration,
}

impl<P: EpaperPanel, C: Clock> DisplayController<P, C> {
    /// Creates a controller in [`SystemState::Startup`].
    ///
    /// `hold` is the minimum time a drawing stays on screen before the
    /// rotation timer may replace it.
    pub fn new(panel: P, store: DrawingStore, qr: QrSlot, clock: C, hold: Duration) -> Self {
        let (width, height) = panel.dimensions();
        Self {
            panel,
            clock,
            renderer: Renderer::new(width, height),
            store,
            qr,
            state: SystemState::Startup,
            last_shown: None,
            hold,
        }
    }

    /// Wakes the panel, clears it and puts it back to sleep.
    pub fn start(&mut self) {
        match self.store.counts() {
            Ok(counts) => info!(
                queued = counts.queued,
                shown = counts.shown,
                removed = counts.removed,
                "drawing store opened"
            ),
            Err(e) => warn!(error = %e, "could not count stored drawings"),
        }
        if let Err(e) = drive(&mut self.panel, |panel| panel.clear()) {
            error!(error = %e, "initial panel clear failed");
        }
    }

    /// Current state.
    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Id of the drawing on screen, if a drawing is on screen.
    pub fn last_shown(&self) -> Option<DrawingId> {
        self.last_shown
    }

    /// The drawing queue.
    pub fn store(&self) -> &DrawingStore {
        &self.store
    }

    /// The panel driver.
    pub fn panel(&self) -> &P {
        &self.panel
    }

    /// Mutable access to the panel driver.
    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    /// Applies one command.
    ///
    /// Errors are storage failures only. Display failures are logged and the
    /// state change goes ahead, so the controller never wedges on a bad
    /// image or a flaky panel.
    pub fn apply_command(&mut self, cmd: Command) -> Result<CommandOutcome, StoreError> {
        if self.state.is_terminal() {
            debug!(command = cmd.name(), "ignoring command after shutdown");
            return Ok(CommandOutcome::Ignored);
        }
        debug!(command = ?cmd, state = ?self.state, "applying command");

        match cmd {
            Command::UpdateQr(bytes) => self.update_qr(&bytes),
            Command::AddDrawing { id, data } => self.add_drawing(id, &data),
            Command::RemoveDrawing(id) => self.remove_drawing(id),
            Command::SetBlanked(true) => Ok(self.blank()),
            Command::SetBlanked(false) => self.unblank(),
        }
    }

    /// One rotation step.
    ///
    /// While a drawing is shown and its hold time has passed, shows the next
    /// queued drawing, or the QR image once the queue is empty.
    pub fn tick(&mut self) -> Result<TickOutcome, StoreError> {
        match self.state {
            SystemState::Shutdown => Ok(TickOutcome::Stopped),
            SystemState::Startup | SystemState::QrCode | SystemState::Blanked => {
                Ok(TickOutcome::Idle)
            }
            SystemState::Drawing => {
                let until = self.hold_expires()?;
                if self.clock.now() < until {
                    return Ok(TickOutcome::Holding { until });
                }
                match self.advance_or_fallback()? {
                    Replacement::Drawing(id) => Ok(TickOutcome::Advanced(id)),
                    Replacement::QrCode => Ok(TickOutcome::FellBack),
                }
            }
        }
    }

    /// Enters [`SystemState::Shutdown`]. Idempotent.
    pub fn shutdown(&mut self) {
        if !self.state.is_terminal() {
            self.enter(SystemState::Shutdown);
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn update_qr(&mut self, bytes: &[u8]) -> Result<CommandOutcome, StoreError> {
        self.qr.store(bytes)?;
        match self.state {
            SystemState::Startup | SystemState::QrCode => {
                self.enter(SystemState::QrCode);
                self.show_image(bytes, "QR code");
                Ok(CommandOutcome::Displayed)
            }
            SystemState::Drawing | SystemState::Blanked => Ok(CommandOutcome::Stored),
            SystemState::Shutdown => Ok(CommandOutcome::Ignored),
        }
    }

    fn add_drawing(&mut self, id: DrawingId, data: &[u8]) -> Result<CommandOutcome, StoreError> {
        let show_now = match self.state {
            SystemState::QrCode => true,
            SystemState::Startup | SystemState::Drawing | SystemState::Blanked => false,
            SystemState::Shutdown => return Ok(CommandOutcome::Ignored),
        };

        match self.store.enqueue(id, data, show_now, self.clock.now()) {
            Ok(()) => {}
            Err(StoreError::DuplicateId(id)) => {
                warn!(id, "drawing already stored, ignoring");
                return Ok(CommandOutcome::Ignored);
            }
            Err(e) => return Err(e),
        }

        if !show_now {
            info!(id, bytes = data.len(), "drawing queued");
            return Ok(CommandOutcome::Stored);
        }

        info!(id, bytes = data.len(), "showing new drawing");
        self.enter(SystemState::Drawing);
        self.last_shown = Some(id);
        self.show_image(data, "drawing");
        Ok(CommandOutcome::Displayed)
    }

    fn remove_drawing(&mut self, id: DrawingId) -> Result<CommandOutcome, StoreError> {
        match self.store.mark_removed(id) {
            Ok(()) => info!(id, "drawing removed"),
            Err(StoreError::NotFound(id)) => {
                warn!(id, "cannot remove unknown drawing");
                return Ok(CommandOutcome::Ignored);
            }
            Err(e) => return Err(e),
        }

        let on_screen = self.last_shown == Some(id);
        match self.state {
            SystemState::Drawing if on_screen => {
                self.advance_or_fallback()?;
                Ok(CommandOutcome::Displayed)
            }
            SystemState::Startup
            | SystemState::QrCode
            | SystemState::Drawing
            | SystemState::Blanked => Ok(CommandOutcome::Stored),
            SystemState::Shutdown => Ok(CommandOutcome::Ignored),
        }
    }

    fn blank(&mut self) -> CommandOutcome {
        info!("blanking panel");
        self.enter(SystemState::Blanked);
        self.last_shown = None;
        if let Err(e) = drive(&mut self.panel, |panel| panel.clear()) {
            error!(error = %e, "panel clear failed");
        }
        CommandOutcome::Displayed
    }

    fn unblank(&mut self) -> Result<CommandOutcome, StoreError> {
        match self.state {
            SystemState::Blanked
            | SystemState::Startup
            | SystemState::QrCode
            | SystemState::Drawing => {
                info!(from = ?self.state, "unblanking panel");
                self.advance_or_fallback()?;
                Ok(CommandOutcome::Displayed)
            }
            SystemState::Shutdown => Ok(CommandOutcome::Ignored),
        }
    }

    // ------------------------------------------------------------------------
    // Shared steps
    // ------------------------------------------------------------------------

    /// Shows the next queued drawing if there is one, the QR image otherwise.
    fn advance_or_fallback(&mut self) -> Result<Replacement, StoreError> {
        if self.store.has_available()? {
            if let Some(id) = self.advance()? {
                return Ok(Replacement::Drawing(id));
            }
        }
        self.show_qr_fallback();
        Ok(Replacement::QrCode)
    }

    /// Shows the oldest queued drawing and marks it displayed.
    fn advance(&mut self) -> Result<Option<DrawingId>, StoreError> {
        let Some(drawing) = self.store.next_available()? else {
            return Ok(None);
        };

        // Consumed before drawing: a failed write leaves the screen as it
        // was, and a drawing that fails to render cannot block the queue.
        self.store.mark_displayed(drawing.id, self.clock.now())?;

        info!(id = drawing.id, "advancing to next drawing");
        self.enter(SystemState::Drawing);
        self.last_shown = Some(drawing.id);
        self.show_image(&drawing.data, "drawing");
        Ok(Some(drawing.id))
    }

    fn show_qr_fallback(&mut self) {
        info!("showing QR code");
        self.enter(SystemState::QrCode);
        self.last_shown = None;
        match self.qr.load() {
            Ok(Some(bytes)) => self.show_image(&bytes, "QR code"),
            Ok(None) => warn!("no QR image received yet, leaving panel as is"),
            Err(e) => error!(error = %e, "could not read QR image"),
        }
    }

    /// When the drawing on screen may be replaced.
    ///
    /// Missing timestamps count as the epoch, so an unknown display time
    /// never blocks rotation.
    fn hold_expires(&self) -> Result<DateTime<Utc>, StoreError> {
        let shown_at = self
            .store
            .most_recently_displayed()?
            .and_then(|drawing| drawing.displayed_time)
            .unwrap_or_default();
        Ok(shown_at + self.hold)
    }

    fn show_image(&mut self, bytes: &[u8], what: &str) {
        let result = self
            .renderer
            .render(bytes)
            .and_then(|frame| push_frame(&mut self.panel, &frame));
        if let Err(e) = result {
            error!(error = %e, "failed to show {what}");
        }
    }

    fn enter(&mut self, next: SystemState) {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "refusing invalid state transition");
            return;
        }
        if self.state != next {
            info!(from = ?self.state, to = ?next, "state transition");
        }
        self.state = next;
    }
}

fn push_frame<P: EpaperPanel>(panel: &mut P, frame: &Bitmap) -> Result<(), DisplayError> {
    drive(panel, |panel| panel.draw(frame))
}

/// Runs one refresh: `init`, the operation, then `sleep`.
///
/// Sleep is attempted even when the operation fails so the panel is never
/// left powered.
fn drive<P, F>(panel: &mut P, op: F) -> Result<(), DisplayError>
where
    P: EpaperPanel,
    F: FnOnce(&mut P) -> Result<(), P::Error>,
{
    let result = panel.init().and_then(|()| op(panel));
    let slept = panel.sleep();
    result
        .and(slept)
        .map_err(|e| DisplayError::DeviceIo(e.to_string()))
}
