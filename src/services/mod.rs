//! Async services around the shared [`Coordinator`](crate::Coordinator).
//!
//! - `mqtt`: broker connection, command dispatch and reconnect loop
//! - `rotation`: periodic tick that rotates drawings
//!
//! Both hold an `Arc<Coordinator>` and push blocking controller work onto
//! tokio's blocking pool, so a slow panel refresh never stalls the reactor.
//! Both stop when the shutdown `watch` channel flips to `true`:
//!
//! ```ignore
//! let coordinator = Arc::new(Coordinator::new(controller));
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//! let timer = RotationTimer::new(Arc::clone(&coordinator), poll).spawn(shutdown_rx.clone());
//! let mqtt = tokio::spawn(MqttHandler::new(Arc::clone(&coordinator), runtime).run(shutdown_rx));
//!
//! coordinator.shutdown();
//! shutdown_tx.send(true)?;
//! timer.await?;
//! ```

pub mod mqtt;
pub mod rotation;

pub use mqtt::*;
pub use rotation::*;
