//! Error types for the Alloy bridge.
//!
//! Errors here are *local*: they abort the current call and never become
//! Rejected outcomes. Failures caused by user input or handler logic
//! become Rejected outcomes in the [`bridge`](crate::bridge) instead.

use thiserror::Error;

use crate::registry::Handle;

/// A body stream could not produce its next chunk.
///
/// The message is used verbatim as the rejection reason of the chunk task
/// that pulled it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StreamError {
    message: String,
}

impl StreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for StreamError {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Errors produced while decoding a length-prefixed frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is empty")]
    Empty,

    #[error("frame has no decimal length prefix")]
    MissingLength,

    #[error("frame length prefix does not fit in usize")]
    LengthOverflow,

    #[error("frame truncated: prefix declares {expected} bytes, {available} available")]
    Truncated { expected: usize, available: usize },
}

/// Errors produced while reading an Outcome Envelope back out of a frame.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("envelope is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced by [`Body`](crate::Body) accessors.
///
/// `NotBytes` and `NotStream` mean the caller used the wrong accessor.
/// They are programming errors.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("cannot get bytes from a stream-backed body, use `raw_as_stream` instead")]
    NotBytes,

    #[error("cannot get a stream from a bytes-backed body, use `raw_as_bytes` instead")]
    NotStream,

    #[error("body stream failed: {0}")]
    Stream(#[from] StreamError),

    #[error("body is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced by handle-based bridge calls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("unknown handle: {0}")]
    UnknownHandle(Handle),

    #[error("handle {handle} does not refer to a {expected}")]
    WrongKind {
        handle: Handle,
        expected: &'static str,
    },
}

/// Result type alias for handle-based bridge calls.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_error_from_str() {
        let err = StreamError::from("socket closed");
        assert_eq!(err.message(), "socket closed");
        assert_eq!(format!("{err}"), "socket closed");
    }

    #[test]
    fn body_error_wraps_stream_error() {
        let err = BodyError::from(StreamError::new("reset"));
        assert_eq!(err.to_string(), "body stream failed: reset");
    }

    #[test]
    fn bridge_error_names_handle() {
        let err = BridgeError::UnknownHandle(Handle::from_raw(42));
        assert_eq!(err.to_string(), "unknown handle: 42");

        let err = BridgeError::WrongKind {
            handle: Handle::from_raw(7),
            expected: "task",
        };
        assert_eq!(err.to_string(), "handle 7 does not refer to a task");
    }

    #[test]
    fn frame_error_reports_sizes() {
        let err = FrameError::Truncated {
            expected: 10,
            available: 3,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains('3'));
    }
}
