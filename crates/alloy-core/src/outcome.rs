//! Outcome Envelope: the wire form of a settled computation.
//!
//! ```text
//! {"t":"Fulfilled","c":<value>}
//! {"t":"Rejected","c":"<reason>"}
//! ```
//!
//! Pending has no envelope. It is the empty frame.

use std::any::Any;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;
use crate::frame;

/// Reason used when a rejection carries nothing descriptive.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Terminal state of a computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "c")]
pub enum Outcome<T> {
    Fulfilled(T),
    Rejected(String),
}

impl<T> Outcome<T> {
    /// Build a rejection, substituting [`UNKNOWN_ERROR`] for a blank reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.trim().is_empty() {
            Outcome::Rejected(UNKNOWN_ERROR.to_string())
        } else {
            Outcome::Rejected(reason)
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }
}

impl<T: Serialize> Outcome<T> {
    /// Serialize this outcome into a framed envelope.
    ///
    /// A value that fails to serialize is reported as a rejection so the
    /// poller always receives a well-formed envelope.
    pub fn to_frame(&self) -> Vec<u8> {
        match serde_json::to_string(self) {
            Ok(json) => frame::encode(&json),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize fulfilled value");
                let rejected: Outcome<()> =
                    Outcome::rejected(format!("failed to serialize result: {e}"));
                // Serializing a string cannot fail.
                frame::encode(&serde_json::to_string(&rejected).unwrap_or_default())
            }
        }
    }
}

impl<T: DeserializeOwned> Outcome<T> {
    /// Read an envelope back out of a polled frame.
    ///
    /// Returns `Ok(None)` for the empty (Pending) frame.
    pub fn from_frame(bytes: &[u8]) -> Result<Option<Self>, EnvelopeError> {
        let payload = frame::decode(bytes)?;
        if payload.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(payload)?))
    }
}

/// The frame returned by a poll while the computation is still running.
pub fn pending_frame() -> Vec<u8> {
    frame::EMPTY_FRAME.to_vec()
}

/// Best-effort rejection reason for a handler error.
///
/// Uses the alternate `Display` form so the cause chain is kept.
pub fn reason_from_error(err: &anyhow::Error) -> String {
    let reason = format!("{err:#}");
    if reason.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        reason
    }
}

/// Best-effort rejection reason for a panic payload.
pub fn reason_from_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        UNKNOWN_ERROR.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfilled_envelope_shape() {
        let frame = Outcome::Fulfilled(serde_json::json!({"done": true})).to_frame();
        let json = std::str::from_utf8(frame::decode(&frame).unwrap()).unwrap();
        assert_eq!(json, r#"{"t":"Fulfilled","c":{"done":true}}"#);
    }

    #[test]
    fn rejected_envelope_shape() {
        let frame = Outcome::<()>::rejected("boom").to_frame();
        assert_eq!(frame, b"27{\"t\":\"Rejected\",\"c\":\"boom\"}".to_vec());
    }

    #[test]
    fn unit_value_serializes_as_null() {
        let frame = Outcome::Fulfilled(()).to_frame();
        let json = std::str::from_utf8(frame::decode(&frame).unwrap()).unwrap();
        assert_eq!(json, r#"{"t":"Fulfilled","c":null}"#);
    }

    #[test]
    fn blank_rejection_uses_fallback() {
        assert_eq!(
            Outcome::<()>::rejected("   "),
            Outcome::Rejected(UNKNOWN_ERROR.to_string())
        );
    }

    #[test]
    fn from_frame_reads_pending_as_none() {
        let parsed = Outcome::<u32>::from_frame(&pending_frame()).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn from_frame_round_trips() {
        let frame = Outcome::Fulfilled(5u32).to_frame();
        assert_eq!(
            Outcome::<u32>::from_frame(&frame).unwrap(),
            Some(Outcome::Fulfilled(5))
        );
    }

    #[test]
    fn error_reason_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("loading user");
        assert_eq!(reason_from_error(&err), "loading user: connection refused");
    }

    #[test]
    fn panic_reasons() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(reason_from_panic(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(reason_from_panic(payload.as_ref()), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(reason_from_panic(payload.as_ref()), UNKNOWN_ERROR);
    }
}
