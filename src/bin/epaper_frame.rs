//! Desktop entry point for the e-paper frame.
//!
//! Frames are written to a PNG file instead of a physical panel.
//!
//! ```bash
//! epaper-frame --config frame.toml
//! RUST_LOG=epaper_frame=debug epaper-frame
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use epaper_frame::hal::PngPanel;
use epaper_frame::services::{MqttHandler, MqttRuntimeConfig, RotationTimer};
use epaper_frame::{Config, Coordinator, DisplayController, DrawingStore, QrSlot, SystemClock};

#[derive(Debug, Parser)]
#[command(version, about = "E-paper drawing frame controller")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // =========================================================================
    // Storage (the only fatal failure)
    // =========================================================================
    let store = DrawingStore::open(&config.storage.database_path).with_context(|| {
        format!(
            "opening drawing store {}",
            config.storage.database_path.display()
        )
    })?;

    // =========================================================================
    // Controller
    // =========================================================================
    let panel = PngPanel::new(
        &config.display.output_path,
        config.display.width,
        config.display.height,
    );
    info!(output = %panel.path().display(), "using PNG panel");

    let mut controller = DisplayController::new(
        panel,
        store,
        QrSlot::new(&config.storage.qr_image_path),
        SystemClock,
        config.rotation.hold(),
    );
    controller.start();
    let coordinator = Arc::new(Coordinator::new(controller));

    // =========================================================================
    // Services
    // =========================================================================
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let timer = RotationTimer::new(Arc::clone(&coordinator), config.rotation.poll_interval())
        .spawn(shutdown_rx.clone());

    let runtime = MqttRuntimeConfig::from_config(&config.mqtt).context("configuring MQTT")?;
    let mqtt = tokio::spawn(MqttHandler::new(Arc::clone(&coordinator), runtime).run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("shutting down");

    // =========================================================================
    // Shutdown: controller first, then the tasks, then storage
    // =========================================================================
    let stopping = Arc::clone(&coordinator);
    tokio::task::spawn_blocking(move || stopping.shutdown())
        .await
        .context("shutting down controller")?;
    // Receivers may already be gone if a task exited early.
    let _ = shutdown_tx.send(true);

    if let Err(e) = timer.await {
        error!(error = %e, "rotation timer task failed");
    }
    match mqtt.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "MQTT handler failed"),
        Err(e) => error!(error = %e, "MQTT task failed"),
    }

    // Last reference: closes the database.
    drop(coordinator);
    info!("stopped");
    Ok(())
}
