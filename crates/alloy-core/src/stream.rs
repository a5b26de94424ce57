//! Pull-based access to a streaming response body.
//!
//! The native runtime never sees the stream itself. It holds a reader
//! handle and asks for one chunk at a time. Each [`StreamReader::read`]
//! starts a new chunk task that the native side polls like any other task.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::Mutex;

use crate::body::{ByteStream, ExhaustedStream};
use crate::task::PollableTask;

/// Fulfilled value of a stream chunk task.
///
/// ```json
/// {"done":false,"value":[104,105]}
/// {"done":true}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResult {
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<u8>>,
}

impl ReadResult {
    pub fn chunk(bytes: Bytes) -> Self {
        Self {
            done: false,
            value: Some(bytes.to_vec()),
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            value: None,
        }
    }
}

/// Reads chunks from a response body stream on behalf of the native side.
///
/// Reads are serialized through a FIFO async mutex, so chunk tasks settle
/// in the order they were issued even when several are outstanding.
pub struct StreamReader {
    stream: Arc<Mutex<ByteStream>>,
    runtime: Handle,
}

impl StreamReader {
    pub fn new(stream: ByteStream, runtime: Handle) -> Self {
        Self {
            stream: Arc::new(Mutex::new(stream)),
            runtime,
        }
    }

    /// Start reading the next chunk.
    ///
    /// A stream error rejects this chunk task only. Once the stream has
    /// ended every further read is fulfilled with `done: true`.
    pub fn read(&self) -> PollableTask<ReadResult> {
        let stream = Arc::clone(&self.stream);
        PollableTask::spawn(&self.runtime, async move {
            let mut stream = stream.lock().await;
            let next = std::future::poll_fn(|cx| stream.as_mut().poll_next(cx)).await;
            match next {
                Some(Ok(chunk)) => {
                    tracing::trace!(len = chunk.len(), "stream chunk read");
                    Ok(ReadResult::chunk(chunk))
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "stream chunk failed");
                    Err(anyhow::Error::new(e))
                }
                None => {
                    // Not every stream tolerates being polled after it ends.
                    *stream = Box::pin(ExhaustedStream);
                    Ok(ReadResult::done())
                }
            }
        })
    }
}
