//! Inbound commands and how they map from topic/payload pairs.
//!
//! Commands arrive on topics under `<prefix>/cmnd/`. The transport strips
//! that prefix and hands the remaining suffix plus raw payload to
//! [`Command::parse`]:
//!
//! | Suffix | Payload | Command |
//! |--------|---------|---------|
//! | `update-qr` | image bytes | [`Command::UpdateQr`] |
//! | `image/add/<id>` | image bytes | [`Command::AddDrawing`] |
//! | `image/remove` | ASCII integer id | [`Command::RemoveDrawing`] |
//! | `blank` | `true` / `false` | [`Command::SetBlanked`] |
//!
//! ```rust
//! use epaper_frame::Command;
//!
//! let cmd = Command::parse("image/add/42", b"\x89PNG...").unwrap();
//! assert!(matches!(cmd, Command::AddDrawing { id: 42, .. }));
//!
//! let cmd = Command::parse("blank", b"true").unwrap();
//! assert_eq!(cmd, Command::SetBlanked(true));
//!
//! assert!(Command::parse("image/remove", b"seven").is_err());
//! ```

use crate::error::CommandError;
use crate::store::DrawingId;

/// Topic suffix for QR image updates.
pub const TOPIC_UPDATE_QR: &str = "update-qr";
/// Topic suffix prefix for new drawings; the id follows the last slash.
pub const TOPIC_ADD_DRAWING: &str = "image/add/";
/// Topic suffix for drawing removal.
pub const TOPIC_REMOVE_DRAWING: &str = "image/remove";
/// Topic suffix for blanking the panel.
pub const TOPIC_BLANK: &str = "blank";

/// A command for the display controller.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the stored QR fallback image.
    UpdateQr(Vec<u8>),
    /// Queue (or immediately show) a new drawing.
    AddDrawing {
        /// Sender-assigned id.
        id: DrawingId,
        /// Encoded image bytes.
        data: Vec<u8>,
    },
    /// Soft-delete a drawing.
    RemoveDrawing(DrawingId),
    /// Blank (`true`) or unblank (`false`) the panel.
    SetBlanked(bool),
}

impl Command {
    /// Parses a command from a topic suffix and payload.
    pub fn parse(suffix: &str, payload: &[u8]) -> Result<Self, CommandError> {
        if suffix == TOPIC_UPDATE_QR {
            return Ok(Self::UpdateQr(payload.to_vec()));
        }

        if let Some(raw_id) = suffix.strip_prefix(TOPIC_ADD_DRAWING) {
            let id = raw_id
                .parse::<DrawingId>()
                .map_err(|_| CommandError::malformed(suffix, format!("bad drawing id {raw_id:?}")))?;
            return Ok(Self::AddDrawing {
                id,
                data: payload.to_vec(),
            });
        }

        match suffix {
            TOPIC_REMOVE_DRAWING => {
                let id = payload_text(payload)
                    .and_then(|text| text.parse::<DrawingId>().ok())
                    .ok_or_else(|| CommandError::malformed(suffix, "id is not an integer"))?;
                Ok(Self::RemoveDrawing(id))
            }
            TOPIC_BLANK => match payload_text(payload) {
                Some("true") => Ok(Self::SetBlanked(true)),
                Some("false") => Ok(Self::SetBlanked(false)),
                _ => Err(CommandError::malformed(suffix, "expected \"true\" or \"false\"")),
            },
            _ => Err(CommandError::UnknownTopic(suffix.to_string())),
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateQr(_) => "update-qr",
            Self::AddDrawing { .. } => "add-drawing",
            Self::RemoveDrawing(_) => "remove-drawing",
            Self::SetBlanked(_) => "set-blanked",
        }
    }
}

// Image payloads can be tens of kilobytes, keep them out of logs.
impl core::fmt::Debug for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UpdateQr(data) => f.debug_tuple("UpdateQr").field(&data.len()).finish(),
            Self::AddDrawing { id, data } => f
                .debug_struct("AddDrawing")
                .field("id", id)
                .field("bytes", &data.len())
                .finish(),
            Self::RemoveDrawing(id) => f.debug_tuple("RemoveDrawing").field(id).finish(),
            Self::SetBlanked(blank) => f.debug_tuple("SetBlanked").field(blank).finish(),
        }
    }
}

/// What applying a command did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The panel was driven (drawing, QR fallback, or clear).
    Displayed,
    /// State was persisted without touching the panel.
    Stored,
    /// Nothing changed: the command was rejected or arrived after shutdown.
    Ignored,
}

fn payload_text(payload: &[u8]) -> Option<&str> {
    core::str::from_utf8(payload).ok().map(str::trim)
}
