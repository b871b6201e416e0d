//! Error taxonomy shared by every component of the conversation pipeline.
//!
//! None of these are fatal to the process: the worst outcome of any of them is
//! a torn-down session that the caller may reconnect.

use crate::session::ConnectionState;
use std::time::Duration;

/// Failure of the underlying WebSocket (or any other) transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("failed to establish transport: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Socket(String),
    #[error("transport is closed")]
    Closed,
}

/// Returned by `SessionConnection::connect`.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("session is already {0:?}; disconnect before connecting again")]
    AlreadyActive(ConnectionState),
    #[error("could not prepare provider session: {0}")]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to send session setup: {0}")]
    Setup(TransportError),
}

/// Failure to build an outbound wire message or endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A single inbound message could not be understood. Recoverable: the message
/// is dropped and the connection continues.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolParseError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
    #[error("message is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Malformed base64 input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid base64 audio: {0}")]
pub struct DecodeError(#[from] pub base64::DecodeError);

/// Failures of the capture side. `PermissionDenied` is meant for the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("audio recording permission is required")]
    PermissionDenied,
    #[error("capture device error: {0}")]
    Device(String),
    #[error("capture interval {0:?} is too short to hold a single sample")]
    InvalidInterval(Duration),
}

/// Failures of the render side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback device error: {0}")]
    Device(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CaptureError::PermissionDenied.to_string(),
            "audio recording permission is required"
        );
        assert_eq!(
            TransportError::Connect("refused".into()).to_string(),
            "failed to establish transport: refused"
        );
        let err = ConnectionError::AlreadyActive(ConnectionState::Connected);
        assert!(err.to_string().contains("Connected"));
    }
}
