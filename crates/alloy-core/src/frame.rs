//! Length-prefixed frame codec.
//!
//! Every payload that crosses the boundary is wrapped in a frame: the
//! payload's byte length as ASCII decimal digits, immediately followed by
//! the payload bytes. There is no delimiter. The digit run ends at the
//! payload's first byte, which is always a non-digit because payloads are
//! JSON objects.
//!
//! ```text
//! {"a":1}   →  7{"a":1}
//! ""        →  [0x00]
//! ```
//!
//! The empty payload is a single NUL byte. A NUL never starts a digit run,
//! so the empty frame cannot be confused with a `0` length prefix.

use crate::error::FrameError;

/// The frame returned for an empty payload (and for Pending polls).
pub const EMPTY_FRAME: [u8; 1] = [0];

/// Encode `payload` as a length-prefixed frame.
///
/// The prefix is the payload's UTF-8 byte length, not its character count.
pub fn encode(payload: &str) -> Vec<u8> {
    if payload.is_empty() {
        return EMPTY_FRAME.to_vec();
    }

    let prefix = payload.len().to_string();
    let mut frame = Vec::with_capacity(prefix.len() + payload.len());
    frame.extend_from_slice(prefix.as_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame
}

/// Decode a frame, returning the payload slice.
///
/// Bytes past the declared payload length are ignored. The empty frame
/// decodes to an empty slice.
pub fn decode(frame: &[u8]) -> Result<&[u8], FrameError> {
    let first = *frame.first().ok_or(FrameError::Empty)?;
    if first == 0 {
        return Ok(&[]);
    }

    let digits = frame.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(FrameError::MissingLength);
    }

    let mut expected: usize = 0;
    for &digit in &frame[..digits] {
        expected = expected
            .checked_mul(10)
            .and_then(|n| n.checked_add(usize::from(digit - b'0')))
            .ok_or(FrameError::LengthOverflow)?;
    }

    let rest = &frame[digits..];
    if rest.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            available: rest.len(),
        });
    }
    Ok(&rest[..expected])
}

/// Returns `true` if `frame` is the empty (Pending) frame.
pub fn is_empty_frame(frame: &[u8]) -> bool {
    frame.first() == Some(&0)
}
