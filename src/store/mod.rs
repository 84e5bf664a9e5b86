//! Durable state: the drawing queue and the QR fallback image.
//!
//! - [`DrawingStore`]: append-only SQLite table of drawings with soft delete
//! - [`QrSlot`]: a single image file, replaced atomically on update
//!
//! Neither type does its own locking. Both are owned by the
//! [`DisplayController`](crate::DisplayController) and reached only through
//! the coordinator's mutex.

mod drawings;
mod qr;

pub use drawings::{Drawing, DrawingId, DrawingStore, QueueCounts};
pub use qr::QrSlot;
