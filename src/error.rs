//! Error types for storage, transport, command parsing and display.
//!
//! None of these are fatal on their own. The only error the binary escalates
//! to process exit is a [`StoreError`] while opening the database at startup.

use thiserror::Error;

use crate::store::DrawingId;

/// Errors from the drawing store and the QR image slot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A drawing with this id has already been stored.
    #[error("drawing {0} already exists")]
    DuplicateId(DrawingId),
    /// No drawing with this id exists.
    #[error("drawing {0} not found")]
    NotFound(DrawingId),
    /// The database rejected the operation.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Reading or writing a file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the messaging transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The initial connection to the broker could not be established.
    #[error("failed to connect to broker: {0}")]
    Connect(String),
    /// An established connection dropped.
    #[error("disconnected from broker: {0}")]
    Disconnected(String),
}

/// Errors turning an inbound message into a command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The payload or the id embedded in the topic could not be parsed.
    #[error("malformed payload on {topic}: {reason}")]
    MalformedPayload {
        /// Topic suffix the message arrived on.
        topic: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The topic is not one of the command topics.
    #[error("unknown command topic {0}")]
    UnknownTopic(String),
}

impl CommandError {
    pub(crate) fn malformed(topic: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors while preparing or pushing a frame to the panel.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The panel driver reported a device failure.
    #[error("display device I/O failure: {0}")]
    DeviceIo(String),
    /// The image bytes could not be decoded.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that was being read.
        path: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The file is not valid TOML or has wrongly typed fields.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
    /// A value parsed but cannot be used.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}
