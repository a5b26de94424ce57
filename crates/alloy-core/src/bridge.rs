//! The handler bridge: everything the native runtime can ask of the host.
//!
//! ```text
//! native runtime                      Bridge
//! ──────────────                      ──────
//! invoke(handler, request json) ───→  deserialize, call handler
//!                               ←───  task handle
//! poll(task)                    ───→  frame: pending / envelope
//! read_stream(reader)           ───→  chunk task handle
//! release(handle)               ───→  drop registry entry
//! ```
//!
//! Failures caused by the request or the handler settle the task as
//! Rejected. Only handle misuse surfaces as a local [`BridgeError`].

use std::sync::{mpsc, Arc};
use std::thread::{self, ThreadId};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle as RuntimeHandle;

use crate::body::BodySource;
use crate::error::BridgeResult;
use crate::handler::{call_guarded, Handler, Reply};
use crate::header::{Header, HeaderMap};
use crate::outcome::Outcome;
use crate::registry::{Handle, HandleRegistry};
use crate::request::{RawRequest, Request};
use crate::response::{Response, WireBody, WireResponse, DEFAULT_STATUS};
use crate::stream::StreamReader;
use crate::task::PollableTask;

/// Default upper bound on the size of a serialized request.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

/// Bridge behaviour that does not depend on the registered routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Requests longer than this are rejected without being parsed.
    pub max_request_bytes: usize,
    /// Headers added to every response that does not already set them.
    pub default_headers: Vec<Header>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            default_headers: Vec::new(),
        }
    }
}

/// Host side of the native boundary.
///
/// Cheap to share: all state lives behind the [`HandleRegistry`].
pub struct Bridge {
    registry: Arc<HandleRegistry>,
    runtime: RuntimeHandle,
    config: BridgeConfig,
    dispatcher: Dispatcher,
    scheduler: Option<ThreadId>,
}

impl Bridge {
    /// Create a bridge whose async work runs on `runtime`.
    ///
    /// Handlers are called on the invoking thread. Use
    /// [`with_scheduler_thread`](Self::with_scheduler_thread) when `runtime`
    /// is driven by a dedicated thread.
    pub fn new(runtime: RuntimeHandle, config: BridgeConfig) -> Self {
        let registry = Arc::new(HandleRegistry::new());
        let dispatcher = Dispatcher {
            runtime: runtime.clone(),
            max_request_bytes: config.max_request_bytes,
            encoder: ResponseEncoder {
                registry: Arc::clone(&registry),
                runtime: runtime.clone(),
                default_headers: config.default_headers.clone().into(),
            },
        };
        Self {
            registry,
            runtime,
            config,
            dispatcher,
            scheduler: None,
        }
    }

    /// Pin handler calls to `thread`, the thread driving the runtime.
    ///
    /// An `invoke` from any other thread hands the call to the scheduler and
    /// blocks until the handler has returned its reply.
    pub fn with_scheduler_thread(mut self, thread: ThreadId) -> Self {
        self.scheduler = Some(thread);
        self
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Register a handler outside of a route table.
    pub fn register_handler(&self, handler: Arc<dyn Handler>) -> Handle {
        self.registry.insert_handler(handler)
    }

    /// Invoke the handler behind `handler` with a serialized request.
    ///
    /// Returns the handle of a new task. A synchronous reply produces a task
    /// that is already settled, so the first poll returns its envelope.
    pub fn invoke(&self, handler: Handle, request: &[u8]) -> BridgeResult<Handle> {
        let target = self.registry.handler(handler).inspect_err(|e| {
            tracing::warn!(handler = handler.as_raw(), error = %e, "invoke on bad handle");
        })?;
        let task = match self.scheduler {
            Some(scheduler) if thread::current().id() != scheduler => {
                self.dispatch_on_scheduler(handler, target, request)
            }
            _ => self.dispatcher.dispatch(handler, target.as_ref(), request),
        };
        Ok(self.registry.insert_task(task))
    }

    /// Format the current state of the task behind `task`.
    pub fn poll(&self, task: Handle) -> BridgeResult<Vec<u8>> {
        let task = self.registry.task(task).inspect_err(|e| {
            tracing::warn!(task = task.as_raw(), error = %e, "poll on bad handle");
        })?;
        Ok(task.poll_frame())
    }

    /// Start reading the next chunk of a streaming body.
    ///
    /// Returns the handle of a new chunk task.
    pub fn read_stream(&self, reader: Handle) -> BridgeResult<Handle> {
        let stream = self.registry.reader(reader).inspect_err(|e| {
            tracing::warn!(reader = reader.as_raw(), error = %e, "read on bad handle");
        })?;
        let task = self.registry.insert_task(stream.read());
        tracing::debug!(reader = reader.as_raw(), task = task.as_raw(), "stream read issued");
        Ok(task)
    }

    /// Drop a handle. Returns `false` if it was not live.
    pub fn release(&self, handle: Handle) -> bool {
        self.registry.release(handle)
    }

    fn dispatch_on_scheduler(
        &self,
        handle: Handle,
        handler: Arc<dyn Handler>,
        request: &[u8],
    ) -> PollableTask<WireResponse> {
        let (tx, rx) = mpsc::sync_channel(1);
        let dispatcher = self.dispatcher.clone();
        let request = request.to_vec();
        self.runtime.spawn(async move {
            let task = dispatcher.dispatch(handle, handler.as_ref(), &request);
            let _ = tx.send(task);
        });

        // A stopped scheduler drops the spawned call, which closes the channel.
        rx.recv().unwrap_or_else(|_| {
            tracing::warn!(handler = handle.as_raw(), "invoke after scheduler stopped");
            PollableTask::settled(Outcome::rejected("host scheduler is not running"))
        })
    }
}

/// Runs one handler call and wraps its reply in a task.
#[derive(Clone)]
struct Dispatcher {
    runtime: RuntimeHandle,
    max_request_bytes: usize,
    encoder: ResponseEncoder,
}

impl Dispatcher {
    fn dispatch(
        &self,
        handle: Handle,
        handler: &dyn Handler,
        request: &[u8],
    ) -> PollableTask<WireResponse> {
        if request.len() > self.max_request_bytes {
            tracing::warn!(
                handler = handle.as_raw(),
                len = request.len(),
                limit = self.max_request_bytes,
                "request rejected — too large"
            );
            return PollableTask::settled(Outcome::rejected(format!(
                "request of {} bytes exceeds the limit of {} bytes",
                request.len(),
                self.max_request_bytes
            )));
        }

        let raw: RawRequest = match serde_json::from_slice(request) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    handler = handle.as_raw(),
                    error = %e,
                    "request rejected — malformed"
                );
                return PollableTask::settled(Outcome::rejected(format!(
                    "malformed request: {e}"
                )));
            }
        };

        tracing::debug!(handler = handle.as_raw(), path = %raw.pathname, "invoking handler");

        // Lets synchronous handlers spawn onto the host scheduler.
        let _context = self.runtime.enter();
        match call_guarded(handler, Request::from(raw)) {
            Reply::Ready(result) => {
                let outcome = match result {
                    Ok(response) => Outcome::Fulfilled(self.encoder.encode(response)),
                    Err(e) => Outcome::rejected(crate::outcome::reason_from_error(&e)),
                };
                PollableTask::settled(outcome)
            }
            Reply::Pending(future) => {
                let encoder = self.encoder.clone();
                PollableTask::spawn(&self.runtime, async move {
                    let response = future.await?;
                    Ok(encoder.encode(response))
                })
            }
        }
    }
}

/// Turns a handler's response into its wire form.
#[derive(Clone)]
struct ResponseEncoder {
    registry: Arc<HandleRegistry>,
    runtime: RuntimeHandle,
    default_headers: Arc<[Header]>,
}

impl ResponseEncoder {
    /// Flatten headers, apply defaults and register a reader for a
    /// streaming body.
    fn encode(&self, response: Option<Response>) -> WireResponse {
        let (status, mut headers, body) = response
            .map(Response::into_parts)
            .unwrap_or((DEFAULT_STATUS, HeaderMap::new(), None));

        headers.merge_defaults(&self.default_headers);
        let headers = (!headers.is_empty()).then(|| headers.into_pairs());

        let body = body.map(|body| match body.into_source() {
            BodySource::Stream(stream) => {
                let reader = StreamReader::new(stream, self.runtime.clone());
                WireBody::Stream(self.registry.insert_reader(reader))
            }
            BodySource::Bytes(bytes) => WireBody::Bytes(bytes.to_vec()),
            BodySource::Text(text) => WireBody::Bytes(text.into_bytes()),
            BodySource::Json(value) => WireBody::Bytes(value.to_string().into_bytes()),
        });

        WireResponse {
            status,
            headers,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::error::{BridgeError, StreamError};
    use crate::frame;
    use crate::stream::ReadResult;

    fn bridge() -> Bridge {
        Bridge::new(RuntimeHandle::current(), BridgeConfig::default())
    }

    fn register(bridge: &Bridge, handler: impl Handler + 'static) -> Handle {
        bridge.register_handler(Arc::new(handler))
    }

    fn get(path: &str) -> Vec<u8> {
        serde_json::to_vec(&RawRequest {
            pathname: path.to_string(),
            ..RawRequest::default()
        })
        .unwrap()
    }

    async fn settle<T: serde::de::DeserializeOwned>(bridge: &Bridge, task: Handle) -> Outcome<T> {
        for _ in 0..1_000 {
            let frame = bridge.poll(task).unwrap();
            if let Some(outcome) = Outcome::from_frame(&frame).unwrap() {
                return outcome;
            }
            tokio::task::yield_now().await;
        }
        panic!("task {task} did not settle");
    }

    #[tokio::test]
    async fn sync_handler_settles_on_first_poll() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| {
            Response::text("ok").with_header("sus", "true")
        });

        let task = bridge.invoke(handler, &get("/")).unwrap();
        let frame = bridge.poll(task).unwrap();

        let json = std::str::from_utf8(frame::decode(&frame).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"t":"Fulfilled","c":{"status":200,"headers":[["sus","true"]],"body":{"t":"Bytes","c":[111,107]}}}"#
        );
    }

    #[tokio::test]
    async fn empty_reply_is_status_200_without_body() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| {});

        let task = bridge.invoke(handler, &get("/")).unwrap();
        let outcome: Outcome<WireResponse> = settle(&bridge, task).await;
        assert_eq!(outcome, Outcome::Fulfilled(WireResponse::default()));
    }

    #[tokio::test]
    async fn async_handler_is_pending_then_fulfilled() {
        let bridge = bridge();
        let (tx, rx) = tokio::sync::oneshot::channel::<&'static str>();
        let rx = std::sync::Mutex::new(Some(rx));
        let handler = register(&bridge, move |_req: Request| {
            let rx = rx.lock().unwrap().take().unwrap();
            Reply::future(async move { Ok(Response::text(rx.await?).with_status(201)) })
        });

        let task = bridge.invoke(handler, &get("/slow")).unwrap();
        assert!(frame::is_empty_frame(&bridge.poll(task).unwrap()));

        tx.send("late").unwrap();
        let outcome: Outcome<WireResponse> = settle(&bridge, task).await;
        assert_eq!(
            outcome,
            Outcome::Fulfilled(WireResponse {
                status: 201,
                headers: None,
                body: Some(WireBody::Bytes(b"late".to_vec())),
            })
        );
    }

    #[tokio::test]
    async fn request_fields_reach_handler() {
        let bridge = bridge();
        let handler = register(&bridge, |mut req: Request| {
            let summary = format!(
                "{} {} {} {:?}",
                req.pathname(),
                req.param("id").unwrap_or("-"),
                req.query_param("q").unwrap_or("-"),
                req.headers().get_all("x-tag"),
            );
            let body = req.take_body();
            Reply::future(async move {
                let text = match body {
                    Some(mut body) => body.text().await?,
                    None => String::new(),
                };
                Ok(Response::text(format!("{summary} {text}")))
            })
        });

        let request = br#"{"pathname":"/users/7","query":{"q":"x"},"params":{"id":"7"},
            "headers":[["x-tag","a"],["X-Tag","b"]],"body":[104,105]}"#;
        let task = bridge.invoke(handler, request).unwrap();

        let Outcome::Fulfilled(wire) = settle::<WireResponse>(&bridge, task).await else {
            panic!("expected fulfilled");
        };
        assert_eq!(
            wire.body,
            Some(WireBody::Bytes(br#"/users/7 7 x ["a", "b"] hi"#.to_vec()))
        );
    }

    #[tokio::test]
    async fn handler_error_rejects() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| {
            Reply::future(async { Err::<Response, _>(anyhow::anyhow!("db down")) })
        });

        let task = bridge.invoke(handler, &get("/")).unwrap();
        let outcome: Outcome<WireResponse> = settle(&bridge, task).await;
        assert_eq!(outcome, Outcome::Rejected("db down".to_string()));
    }

    #[tokio::test]
    async fn sync_panic_rejects() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| -> Response { panic!("sync boom") });

        let task = bridge.invoke(handler, &get("/")).unwrap();
        let outcome: Outcome<WireResponse> = settle(&bridge, task).await;
        assert_eq!(outcome, Outcome::Rejected("sync boom".to_string()));
    }

    #[tokio::test]
    async fn async_panic_rejects() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| {
            Reply::future(async {
                if true {
                    panic!("async boom");
                }
                Ok(Response::new())
            })
        });

        let task = bridge.invoke(handler, &get("/")).unwrap();
        let outcome: Outcome<WireResponse> = settle(&bridge, task).await;
        assert_eq!(outcome, Outcome::Rejected("async boom".to_string()));
    }

    #[tokio::test]
    async fn malformed_request_rejects_only_that_request() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| Response::text("ok"));

        let bad = bridge.invoke(handler, b"{not json").unwrap();
        let outcome: Outcome<WireResponse> = settle(&bridge, bad).await;
        let Outcome::Rejected(reason) = outcome else {
            panic!("expected rejection");
        };
        assert!(reason.starts_with("malformed request:"), "{reason}");

        let good = bridge.invoke(handler, &get("/")).unwrap();
        assert!(settle::<WireResponse>(&bridge, good).await.is_fulfilled());
    }

    #[tokio::test]
    async fn oversize_request_rejects_without_calling_handler() {
        let bridge = Bridge::new(
            RuntimeHandle::current(),
            BridgeConfig {
                max_request_bytes: 8,
                ..BridgeConfig::default()
            },
        );
        let handler = register(&bridge, |_req: Request| -> Response {
            panic!("handler must not run")
        });

        let task = bridge.invoke(handler, &get("/way/too/long")).unwrap();
        let outcome: Outcome<WireResponse> = settle(&bridge, task).await;
        let Outcome::Rejected(reason) = outcome else {
            panic!("expected rejection");
        };
        assert!(reason.contains("limit of 8 bytes"), "{reason}");
    }

    #[tokio::test]
    async fn default_headers_merge_handler_wins() {
        let bridge = Bridge::new(
            RuntimeHandle::current(),
            BridgeConfig {
                default_headers: vec![
                    Header::new("content-type", "text/plain"),
                    Header::new("server", "alloy"),
                ],
                ..BridgeConfig::default()
            },
        );
        let handler = register(&bridge, |_req: Request| {
            Response::json(serde_json::json!({"ok": true}))
                .with_header("set-cookie", "a=1")
                .with_header("Set-Cookie", "b=2")
        });

        let task = bridge.invoke(handler, &get("/")).unwrap();
        let Outcome::Fulfilled(wire) = settle::<WireResponse>(&bridge, task).await else {
            panic!("expected fulfilled");
        };
        let pairs: Vec<(&str, &str)> = wire
            .headers
            .as_deref()
            .unwrap()
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("content-type", "application/json"),
                ("set-cookie", "a=1"),
                ("Set-Cookie", "b=2"),
                ("server", "alloy"),
            ]
        );
    }

    #[tokio::test]
    async fn streaming_body_is_read_chunk_by_chunk() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| {
            let chunks: Vec<Result<Bytes, StreamError>> =
                vec![Ok(Bytes::from_static(b"he")), Ok(Bytes::from_static(b"llo"))];
            Response::new().with_body(BodySource::stream(futures_util::stream::iter(chunks)))
        });

        let task = bridge.invoke(handler, &get("/stream")).unwrap();
        let Outcome::Fulfilled(wire) = settle::<WireResponse>(&bridge, task).await else {
            panic!("expected fulfilled");
        };
        let Some(WireBody::Stream(reader)) = wire.body else {
            panic!("expected stream body, got {:?}", wire.body);
        };

        let mut collected = Vec::new();
        loop {
            let chunk = bridge.read_stream(reader).unwrap();
            match settle::<ReadResult>(&bridge, chunk).await {
                Outcome::Fulfilled(ReadResult { done: true, .. }) => break,
                Outcome::Fulfilled(ReadResult { value, .. }) => collected.extend(value.unwrap()),
                Outcome::Rejected(reason) => panic!("chunk rejected: {reason}"),
            }
            assert!(bridge.release(chunk));
        }
        assert_eq!(collected, b"hello");
        assert!(bridge.release(reader));
    }

    #[tokio::test]
    async fn unknown_and_mismatched_handles_are_local_errors() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| Response::new());
        let missing = Handle::from_raw(999);

        assert_eq!(
            bridge.invoke(missing, &get("/")),
            Err(BridgeError::UnknownHandle(missing))
        );
        assert_eq!(
            bridge.poll(handler),
            Err(BridgeError::WrongKind {
                handle: handler,
                expected: "task"
            })
        );
        assert!(bridge.read_stream(handler).is_err());
    }

    #[tokio::test]
    async fn released_task_is_gone() {
        let bridge = bridge();
        let handler = register(&bridge, |_req: Request| Response::new());
        let task = bridge.invoke(handler, &get("/")).unwrap();

        assert!(bridge.release(task));
        assert_eq!(bridge.poll(task), Err(BridgeError::UnknownHandle(task)));
        assert!(!bridge.release(task));
        // The handler itself stays registered.
        assert!(bridge.invoke(handler, &get("/")).is_ok());
    }
}
