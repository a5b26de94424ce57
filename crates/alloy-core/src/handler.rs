//! User handler abstraction.
//!
//! A handler receives a [`Request`] and returns a [`Reply`]. The reply is
//! either ready at once or a boxed future. Plain closures are handlers:
//!
//! ```ignore
//! routes.get("/", |_req: Request| Response::text("ok"));
//! routes.get("/slow", |_req: Request| Reply::future(async {
//!     Ok(Response::text("done"))
//! }));
//! ```

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;

use crate::outcome::reason_from_panic;
use crate::request::Request;
use crate::response::Response;

/// Future returned by an asynchronous handler.
///
/// Resolving to `Ok(None)` means "no response": status 200, no body.
pub type BoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<Option<Response>>> + Send>>;

/// What a handler hands back for one request.
pub enum Reply {
    /// The handler finished synchronously.
    Ready(anyhow::Result<Option<Response>>),
    /// The handler finishes when the future resolves.
    Pending(BoxFuture),
}

impl Reply {
    /// Wrap an async computation as a reply.
    pub fn future<F, R>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Into<Option<Response>>,
    {
        Reply::Pending(Box::pin(async move { future.await.map(Into::into) }))
    }

    /// A finished reply with no response.
    pub fn empty() -> Self {
        Reply::Ready(Ok(None))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Reply::Ready(_))
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Reply::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Ready(Ok(Some(response)))
    }
}

impl From<Option<Response>> for Reply {
    fn from(response: Option<Response>) -> Self {
        Reply::Ready(Ok(response))
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::empty()
    }
}

impl From<anyhow::Result<Response>> for Reply {
    fn from(result: anyhow::Result<Response>) -> Self {
        Reply::Ready(result.map(Some))
    }
}

impl From<anyhow::Result<Option<Response>>> for Reply {
    fn from(result: anyhow::Result<Option<Response>>) -> Self {
        Reply::Ready(result)
    }
}

impl From<anyhow::Result<()>> for Reply {
    fn from(result: anyhow::Result<()>) -> Self {
        Reply::Ready(result.map(|()| None))
    }
}

impl From<BoxFuture> for Reply {
    fn from(future: BoxFuture) -> Self {
        Reply::Pending(future)
    }
}

/// A request handler registered with the bridge.
pub trait Handler: Send + Sync {
    fn call(&self, request: Request) -> Reply;
}

impl<F, R> Handler for F
where
    F: Fn(Request) -> R + Send + Sync + 'static,
    R: Into<Reply>,
{
    fn call(&self, request: Request) -> Reply {
        self(request).into()
    }
}

/// Call `handler`, turning a synchronous panic into a failed reply.
pub(crate) fn call_guarded(handler: &dyn Handler, request: Request) -> Reply {
    match catch_unwind(AssertUnwindSafe(|| handler.call(request))) {
        Ok(reply) => reply,
        Err(payload) => {
            let reason = reason_from_panic(payload.as_ref());
            tracing::warn!(reason = %reason, "handler panicked");
            Reply::Ready(Err(anyhow::Error::msg(reason)))
        }
    }
}
