use serde::{Deserialize, Serialize};

use crate::body::{Body, BodySource};
use crate::header::HeaderMap;
use crate::registry::Handle;

/// Status used when a handler returns nothing or leaves the status unset.
pub const DEFAULT_STATUS: u16 = 200;

/// An outgoing response produced by a user handler.
///
/// The body may be bytes-backed or stream-backed. A stream-backed body
/// is not buffered. The native runtime pulls its chunks one read at a time
/// through a [`StreamReader`](crate::StreamReader).
#[derive(Debug, Default)]
pub struct Response {
    status: Option<u16>,
    headers: HeaderMap,
    body: Option<Body>,
}

impl Response {
    /// An empty response: status 200, no headers, no body.
    pub fn new() -> Self {
        Self::default()
    }

    /// A 200 response with a text body.
    pub fn text(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::new().with_body(body)
    }

    /// A 200 response with a JSON body.
    pub fn json(value: serde_json::Value) -> Self {
        Self::new()
            .with_header("content-type", "application/json")
            .with_body(value)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<BodySource>) -> Self {
        self.body = Some(Body::new(body));
        self
    }

    pub fn status(&self) -> u16 {
        self.status.unwrap_or(DEFAULT_STATUS)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> Option<&mut Body> {
        self.body.as_mut()
    }

    /// Returns `true` if the body is streaming (not pre-buffered).
    pub fn is_streaming(&self) -> bool {
        self.body.as_ref().is_some_and(Body::is_stream)
    }

    pub(crate) fn into_parts(self) -> (u16, HeaderMap, Option<Body>) {
        (self.status(), self.headers, self.body)
    }
}

/// A response body as it crosses the boundary.
///
/// `Stream` carries the handle of a registered stream reader instead of
/// any bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "c")]
pub enum WireBody {
    Bytes(Vec<u8>),
    Stream(Handle),
}

/// A response as the native runtime deserializes it from a Fulfilled
/// envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireResponse {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<(String, String)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<WireBody>,
}

impl Default for WireResponse {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS,
            headers: None,
            body: None,
        }
    }
}

fn default_status() -> u16 {
    DEFAULT_STATUS
}
