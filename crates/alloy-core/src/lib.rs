//! Alloy bridge: the host side of an async boundary between user request
//! handlers and a native HTTP runtime.
//!
//! The native runtime owns sockets and routing. It calls into the host
//! with a serialized request and gets back a task handle, then polls that
//! handle until the handler's response is ready. Nothing on the native
//! side ever awaits host futures.
//!
//! # Wire model
//!
//! Every payload crossing the boundary is a length-prefixed [`frame`]
//! carrying JSON. A poll returns the empty frame while the task is
//! pending and an [`Outcome`] envelope once it settles:
//!
//! ```text
//! 0x00                                    pending
//! 36{"t":"Fulfilled","c":{"status":200}}  fulfilled
//! 27{"t":"Rejected","c":"boom"}           rejected
//! ```
//!
//! Streaming response bodies are not buffered. The response carries a
//! [`StreamReader`] handle and the native side pulls chunks through
//! [`Bridge::read_stream`], one chunk task per read.
//!
//! # Ownership
//!
//! Handlers, tasks and readers live in a [`HandleRegistry`] until the
//! native side releases their handles or the host shuts down.

pub mod body;
pub mod bridge;
mod error;
pub mod frame;
mod handler;
mod header;
pub mod outcome;
pub mod registry;
mod request;
mod response;
mod routes;
mod stream;
pub mod task;

pub use body::{Body, BodySource, ByteStream};
pub use bridge::{Bridge, BridgeConfig, DEFAULT_MAX_REQUEST_BYTES};
pub use error::{BodyError, BridgeError, BridgeResult, EnvelopeError, FrameError, StreamError};
pub use handler::{BoxFuture, Handler, Reply};
pub use header::{Header, HeaderMap};
pub use outcome::{Outcome, UNKNOWN_ERROR};
pub use registry::{Handle, HandleRegistry};
pub use request::{RawRequest, Request};
pub use response::{Response, WireBody, WireResponse, DEFAULT_STATUS};
pub use routes::{Method, RouteEntry, RouteOptions, RouteTable, Routes, UnknownMethod};
pub use stream::{ReadResult, StreamReader};
pub use task::{Pollable, PollableTask, TaskStatus};
