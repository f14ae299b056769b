//! Error types for framelink

use thiserror::Error;

/// Per-frame codec failures. All variants are recoverable: the frame is skipped
/// or treated as carrying no detections.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("frame encode failed: {0}")]
    Encode(String),

    #[error("payload of {len} bytes exceeds the {limit} byte wire limit")]
    PayloadTooLarge { len: usize, limit: usize },

    #[error(transparent)]
    Parse(#[from] ParseWarning),
}

/// A response that could not be decoded into detections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed {mode} response: {reason}")]
pub struct ParseWarning {
    pub mode: &'static str,
    pub reason: String,
}

impl ParseWarning {
    pub fn new(mode: &'static str, reason: impl Into<String>) -> Self {
        Self {
            mode,
            reason: reason.into(),
        }
    }
}

/// Failures of the detection-service connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

impl ConnectionError {
    pub(crate) fn lost(err: impl std::fmt::Display) -> Self {
        ConnectionError::ConnectionLost(err.to_string())
    }
}

/// Frame source failures.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open video source {identifier:?}: {reason}")]
    Open { identifier: String, reason: String },

    #[error("frame read failed: {0}")]
    Read(String),

    /// No frame arrived within the read timeout; the source is still usable
    #[error("no frame within {0:?}")]
    Stalled(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Display surface failures.
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("display init failed: {0}")]
    Init(String),

    #[error("render failed: {0}")]
    Render(String),
}

/// Session-level errors surfaced by the stream controller.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("startup failed: {0}")]
    Startup(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<::config::ConfigError> for StreamError {
    fn from(err: ::config::ConfigError) -> Self {
        StreamError::Config(err.to_string())
    }
}
