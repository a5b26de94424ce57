//! Route registry and the route table handed to the native runtime.
//!
//! ```json
//! {"routes":{"/users/:id":{"get":{"pointer":3,"body":false}}}}
//! ```
//!
//! `pointer` is the handler handle the native side passes back to
//! `invoke`. `body` tells it whether to collect the request body first.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame;
use crate::handler::Handler;
use crate::registry::{Handle, HandleRegistry};

/// HTTP methods the native router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Trace,
    Head,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Options,
        Method::Trace,
        Method::Head,
    ];

    /// The lowercase wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
            Method::Patch => "patch",
            Method::Options => "options",
            Method::Trace => "trace",
            Method::Head => "head",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Per-route options forwarded to the native runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteOptions {
    /// Collect the request body before invoking the handler.
    pub body: bool,
}

impl RouteOptions {
    pub fn with_body() -> Self {
        Self { body: true }
    }
}

#[derive(Clone)]
struct Route {
    options: RouteOptions,
    handler: Arc<dyn Handler>,
}

/// Handlers keyed by path and method, built before the host starts serving.
#[derive(Default, Clone)]
pub struct Routes {
    routes: BTreeMap<String, BTreeMap<Method, Route>>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `path` with default options.
    ///
    /// Registering the same path and method again replaces the handler.
    pub fn route(
        self,
        path: impl Into<String>,
        method: Method,
        handler: impl Handler + 'static,
    ) -> Self {
        self.route_with(path, method, RouteOptions::default(), handler)
    }

    pub fn route_with(
        mut self,
        path: impl Into<String>,
        method: Method,
        options: RouteOptions,
        handler: impl Handler + 'static,
    ) -> Self {
        let path = path.into();
        let route = Route {
            options,
            handler: Arc::new(handler),
        };
        if self
            .routes
            .entry(path.clone())
            .or_default()
            .insert(method, route)
            .is_some()
        {
            tracing::debug!(path = %path, method = %method, "route replaced");
        }
        self
    }

    pub fn get(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(path, Method::Get, handler)
    }

    pub fn post(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(path, Method::Post, handler)
    }

    pub fn put(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(path, Method::Put, handler)
    }

    pub fn delete(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(path, Method::Delete, handler)
    }

    pub fn patch(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(path, Method::Patch, handler)
    }

    pub fn options(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(path, Method::Options, handler)
    }

    pub fn trace(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(path, Method::Trace, handler)
    }

    pub fn head(self, path: impl Into<String>, handler: impl Handler + 'static) -> Self {
        self.route(path, Method::Head, handler)
    }

    /// Number of (path, method) pairs.
    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Register every handler in `registry` and describe them as a table.
    ///
    /// Each call registers the handlers again under fresh handles.
    pub fn export(&self, registry: &HandleRegistry) -> RouteTable {
        let routes = self
            .routes
            .iter()
            .map(|(path, methods)| {
                let methods = methods
                    .iter()
                    .map(|(method, route)| {
                        let pointer = registry.insert_handler(Arc::clone(&route.handler));
                        tracing::debug!(
                            path = %path,
                            method = %method,
                            handler = pointer.as_raw(),
                            "route exported"
                        );
                        let entry = RouteEntry {
                            pointer,
                            body: route.options.body,
                        };
                        (*method, entry)
                    })
                    .collect();
                (path.clone(), methods)
            })
            .collect();
        RouteTable { routes }
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (path, methods) in &self.routes {
            map.entry(path, &methods.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

/// One exported route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub pointer: Handle,
    pub body: bool,
}

/// The route table handed to the native runtime at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub routes: BTreeMap<String, BTreeMap<Method, RouteEntry>>,
}

impl RouteTable {
    /// Handler handle for `path` and `method`, if routed.
    pub fn lookup(&self, path: &str, method: Method) -> Option<RouteEntry> {
        self.routes.get(path)?.get(&method).copied()
    }

    /// Serialize as a length-prefixed frame.
    pub fn to_frame(&self) -> Result<Vec<u8>, serde_json::Error> {
        Ok(frame::encode(&serde_json::to_string(self)?))
    }

    pub fn from_frame(bytes: &[u8]) -> Result<Self, crate::error::EnvelopeError> {
        Ok(serde_json::from_slice(frame::decode(bytes)?)?)
    }
}
