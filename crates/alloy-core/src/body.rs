//! Request and response bodies.
//!
//! A [`Body`] is backed either by an in-memory `Bytes` buffer or by a lazy
//! stream of byte chunks. Handlers supply bodies as a [`BodySource`]
//! (text, bytes, stream or a JSON value), which is converted to one of
//! the two canonical forms at construction time.
//!
//! # Single consumption
//!
//! A stream-backed body can be read once. Any materializing call
//! ([`text`](Body::text), [`json`](Body::json), [`raw`](Body::raw)) drains
//! the stream, and [`raw_as_stream`](Body::raw_as_stream) hands the stream
//! out. Either way the body is left holding an exhausted stream, so later
//! reads see end-of-stream.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use serde::de::DeserializeOwned;

use crate::error::{BodyError, StreamError};

/// A type-erased, fallible async stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Anything a handler may use as a body.
pub enum BodySource {
    Text(String),
    Bytes(Bytes),
    Stream(ByteStream),
    Json(serde_json::Value),
}

impl BodySource {
    /// Wrap a chunk stream as a body source.
    pub fn stream(
        stream: impl Stream<Item = Result<Bytes, StreamError>> + Send + 'static,
    ) -> Self {
        BodySource::Stream(Box::pin(stream))
    }
}

impl fmt::Debug for BodySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodySource::Text(s) => f.debug_tuple("Text").field(s).finish(),
            BodySource::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            BodySource::Stream(_) => f.write_str("Stream(..)"),
            BodySource::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

impl From<&str> for BodySource {
    fn from(s: &str) -> Self {
        BodySource::Text(s.to_string())
    }
}

impl From<String> for BodySource {
    fn from(s: String) -> Self {
        BodySource::Text(s)
    }
}

impl From<Vec<u8>> for BodySource {
    fn from(v: Vec<u8>) -> Self {
        BodySource::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for BodySource {
    fn from(b: Bytes) -> Self {
        BodySource::Bytes(b)
    }
}

impl From<serde_json::Value> for BodySource {
    fn from(v: serde_json::Value) -> Self {
        BodySource::Json(v)
    }
}

impl From<ByteStream> for BodySource {
    fn from(s: ByteStream) -> Self {
        BodySource::Stream(s)
    }
}

enum Repr {
    Bytes(Bytes),
    Stream(ByteStream),
}

/// A body backed by bytes or by a single-use stream.
pub struct Body {
    repr: Repr,
}

impl Body {
    pub fn new(source: impl Into<BodySource>) -> Self {
        let repr = match source.into() {
            BodySource::Text(s) => Repr::Bytes(Bytes::from(s)),
            BodySource::Bytes(b) => Repr::Bytes(b),
            BodySource::Stream(s) => Repr::Stream(s),
            BodySource::Json(v) => Repr::Bytes(Bytes::from(v.to_string())),
        };
        Self { repr }
    }

    /// Returns `true` if this body is backed by a stream.
    pub fn is_stream(&self) -> bool {
        matches!(self.repr, Repr::Stream(_))
    }

    /// Decode the full body as UTF-8 (lossy), draining a stream if needed.
    pub async fn text(&mut self) -> Result<String, BodyError> {
        let raw = self.raw().await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Parse the full body as JSON, draining a stream if needed.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, BodyError> {
        let raw = self.raw().await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// The full body bytes. Consumes the stream if this body is backed by one.
    pub async fn raw(&mut self) -> Result<Bytes, BodyError> {
        match &mut self.repr {
            Repr::Bytes(b) => Ok(b.clone()),
            Repr::Stream(stream) => {
                let mut stream = std::mem::replace(stream, Box::pin(ExhaustedStream));
                Ok(drain(&mut stream).await?)
            }
        }
    }

    /// The bytes backing this body. Fails if the body is stream-backed.
    pub fn raw_as_bytes(&self) -> Result<&Bytes, BodyError> {
        match &self.repr {
            Repr::Bytes(b) => Ok(b),
            Repr::Stream(_) => Err(BodyError::NotBytes),
        }
    }

    /// Take the stream backing this body. Fails if the body is bytes-backed.
    ///
    /// The body keeps an exhausted stream in its place.
    pub fn raw_as_stream(&mut self) -> Result<ByteStream, BodyError> {
        match &mut self.repr {
            Repr::Stream(stream) => Ok(std::mem::replace(stream, Box::pin(ExhaustedStream))),
            Repr::Bytes(_) => Err(BodyError::NotStream),
        }
    }

    /// The canonical representation, untyped.
    pub fn into_source(self) -> BodySource {
        match self.repr {
            Repr::Bytes(b) => BodySource::Bytes(b),
            Repr::Stream(s) => BodySource::Stream(s),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Bytes(b) => f.debug_struct("Body").field("bytes", &b.len()).finish(),
            Repr::Stream(_) => f.debug_struct("Body").field("stream", &true).finish(),
        }
    }
}

/// Poll the stream to completion and concatenate all chunks.
pub(crate) async fn drain(stream: &mut ByteStream) -> Result<Bytes, StreamError> {
    let mut collected = Vec::new();
    while let Some(chunk) = std::future::poll_fn(|cx| stream.as_mut().poll_next(cx)).await {
        collected.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(collected))
}

/// A stream that has already ended.
pub(crate) struct ExhaustedStream;

impl Stream for ExhaustedStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(None)
    }
}
