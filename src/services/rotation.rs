//! Periodic drawing rotation.
//!
//! Wakes every poll interval and asks the controller to
//! [`tick`](crate::DisplayController::tick). The hold-time decision lives in
//! the controller, so the timer itself only owns the schedule and the stop
//! signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::controller::TickOutcome;
use crate::coordinator::Coordinator;
use crate::traits::{Clock, EpaperPanel};

/// Drives [`Coordinator::tick`] on a fixed interval.
pub struct RotationTimer<P, C>
where
    P: EpaperPanel + Send + 'static,
    C: Clock + Send + 'static,
{
    coordinator: Arc<Coordinator<P, C>>,
    poll_interval: Duration,
}

impl<P, C> RotationTimer<P, C>
where
    P: EpaperPanel + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Create a timer that ticks every `poll_interval`.
    pub fn new(coordinator: Arc<Coordinator<P, C>>, poll_interval: Duration) -> Self {
        Self {
            coordinator,
            poll_interval,
        }
    }

    /// Spawn the timer onto the runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Tick until `shutdown` flips (or its sender is dropped) or the
    /// controller reports it has shut down.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.poll_interval, "rotation timer started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }

            let coordinator = Arc::clone(&self.coordinator);
            match tokio::task::spawn_blocking(move || coordinator.tick()).await {
                Ok(Ok(TickOutcome::Stopped)) => break,
                Ok(Ok(outcome)) => debug!(?outcome, "rotation tick"),
                Ok(Err(e)) => error!(error = %e, "rotation tick failed"),
                Err(e) => error!(error = %e, "rotation tick panicked"),
            }
        }

        info!("rotation timer stopped");
    }
}
