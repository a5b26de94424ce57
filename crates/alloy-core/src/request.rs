use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::body::Body;
use crate::header::HeaderMap;

/// An incoming request as the native runtime serializes it.
///
/// ```json
/// {"pathname":"/users/7","query":{"page":"1"},"headers":[["host","a"]],
///  "params":{"id":"7"},"body":[104,105]}
/// ```
///
/// Every field except `pathname` may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    pub pathname: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

/// The request handed to a user handler.
///
/// Headers keep their wire order and duplicates. The body is present only
/// when the native runtime collected one, and is always bytes-backed.
#[derive(Debug)]
pub struct Request {
    pathname: String,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<Body>,
}

impl Request {
    /// Create a request with no query, params or body.
    pub fn new(pathname: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            pathname: pathname.into(),
            query: HashMap::new(),
            params: HashMap::new(),
            headers,
            body: None,
        }
    }

    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// A single query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// A single path parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Mutable access for the reading accessors ([`Body::text`] etc.).
    pub fn body_mut(&mut self) -> Option<&mut Body> {
        self.body.as_mut()
    }

    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }
}

impl From<RawRequest> for Request {
    fn from(raw: RawRequest) -> Self {
        Self {
            pathname: raw.pathname,
            query: raw.query,
            params: raw.params,
            headers: raw.headers.into_iter().collect(),
            body: raw.body.map(Body::new),
        }
    }
}
