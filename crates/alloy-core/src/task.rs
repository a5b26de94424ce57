//! Pollable tasks: non-blocking status queries over async computations.
//!
//! A [`PollableTask`] adapts one asynchronous computation for a caller that
//! cannot await it. The computation is spawned eagerly on the cooperative
//! scheduler, and an observer task settles the shared state exactly once
//! when it completes. [`PollableTask::poll`] only reads that state. It never
//! suspends and never drives the computation forward, so callers poll in a
//! loop until the frame is no longer empty.
//!
//! # State machine
//!
//! ```text
//! Pending ──(computation returns Ok)────────→ Fulfilled(value)
//!    │
//!    └────(returns Err / panics)─────────────→ Rejected(reason)
//! ```
//!
//! Settlement is a single `OnceLock::set`. A poller on another thread sees
//! the terminal status and its payload together, or neither.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::runtime::Handle;

use crate::outcome::{pending_frame, reason_from_error, reason_from_panic, Outcome};

/// Observable status of a pollable task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Fulfilled,
    Rejected,
}

/// Formats the current state of a task into a poll frame.
///
/// Receives `None` while the task is pending.
pub type Formatter<T> = Arc<dyn Fn(Option<&Outcome<T>>) -> Vec<u8> + Send + Sync>;

/// Object-safe view of a task, used by the handle registry.
pub trait Pollable: Send + Sync {
    /// Format the current state as a frame.
    fn poll_frame(&self) -> Vec<u8>;

    fn status(&self) -> TaskStatus;
}

/// A single async computation exposed through a pull-based query interface.
pub struct PollableTask<T> {
    state: Arc<OnceLock<Outcome<T>>>,
    formatter: Formatter<T>,
}

impl<T> Clone for PollableTask<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            formatter: Arc::clone(&self.formatter),
        }
    }
}

impl<T> PollableTask<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Start `computation` on `runtime` and return its pollable task.
    ///
    /// An `Err` result or a panic inside the computation settles the task as
    /// Rejected.
    pub fn spawn<F>(runtime: &Handle, computation: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let state = Arc::new(OnceLock::new());
        let running = runtime.spawn(computation);

        let observed = Arc::clone(&state);
        runtime.spawn(async move {
            let outcome = match running.await {
                Ok(Ok(value)) => Outcome::Fulfilled(value),
                Ok(Err(err)) => Outcome::rejected(reason_from_error(&err)),
                Err(join_err) if join_err.is_panic() => {
                    Outcome::rejected(reason_from_panic(&*join_err.into_panic()))
                }
                Err(join_err) => Outcome::rejected(join_err.to_string()),
            };
            settle(&observed, outcome);
        });

        Self::from_state(state)
    }

    /// A task that is already settled. No computation is spawned.
    pub fn settled(outcome: Outcome<T>) -> Self {
        let state = Arc::new(OnceLock::new());
        settle(&state, outcome);
        Self::from_state(state)
    }

    fn from_state(state: Arc<OnceLock<Outcome<T>>>) -> Self {
        Self {
            state,
            formatter: Arc::new(default_format::<T>),
        }
    }
}

impl<T> PollableTask<T> {
    /// Replace the default envelope formatting.
    pub fn with_formatter(
        mut self,
        formatter: impl Fn(Option<&Outcome<T>>) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Format the current state: the empty frame while pending, otherwise
    /// the settled envelope. Repeated polls after settlement return
    /// identical frames.
    pub fn poll(&self) -> Vec<u8> {
        (self.formatter)(self.state.get())
    }

    pub fn status(&self) -> TaskStatus {
        match self.state.get() {
            None => TaskStatus::Pending,
            Some(Outcome::Fulfilled(_)) => TaskStatus::Fulfilled,
            Some(Outcome::Rejected(_)) => TaskStatus::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.get().is_none()
    }

    /// The settled outcome, if any.
    pub fn outcome(&self) -> Option<&Outcome<T>> {
        self.state.get()
    }
}

impl<T: Send + Sync> Pollable for PollableTask<T> {
    fn poll_frame(&self) -> Vec<u8> {
        PollableTask::poll(self)
    }

    fn status(&self) -> TaskStatus {
        PollableTask::status(self)
    }
}

fn settle<T>(state: &OnceLock<Outcome<T>>, outcome: Outcome<T>) {
    let rejected = outcome.is_rejected();
    if state.set(outcome).is_err() {
        // The observer is the only writer, so this never happens.
        tracing::warn!("pollable task settled twice; keeping first outcome");
        return;
    }
    tracing::debug!(rejected, "pollable task settled");
}

fn default_format<T: Serialize>(outcome: Option<&Outcome<T>>) -> Vec<u8> {
    match outcome {
        None => pending_frame(),
        Some(outcome) => outcome.to_frame(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::frame;
    use crate::outcome::UNKNOWN_ERROR;

    async fn wait_settled<T>(task: &PollableTask<T>) {
        for _ in 0..1_000 {
            if !task.is_pending() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("task did not settle");
    }

    #[tokio::test]
    async fn pending_until_computation_completes() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let task = PollableTask::spawn(&Handle::current(), async move { Ok(rx.await?) });

        assert_eq!(task.poll(), pending_frame());
        assert_eq!(task.status(), TaskStatus::Pending);

        tx.send(7).unwrap();
        wait_settled(&task).await;

        assert_eq!(task.status(), TaskStatus::Fulfilled);
        assert_eq!(task.outcome(), Some(&Outcome::Fulfilled(7)));
    }

    #[tokio::test]
    async fn polls_after_settlement_are_identical() {
        let task = PollableTask::spawn(&Handle::current(), async { Ok("done".to_string()) });
        wait_settled(&task).await;

        let first = task.poll();
        for _ in 0..5 {
            assert_eq!(task.poll(), first);
        }
        let json = std::str::from_utf8(frame::decode(&first).unwrap()).unwrap();
        assert_eq!(json, r#"{"t":"Fulfilled","c":"done"}"#);
    }

    #[tokio::test]
    async fn error_result_rejects_with_reason() {
        let task: PollableTask<u32> = PollableTask::spawn(&Handle::current(), async {
            Err(anyhow::anyhow!("database unavailable"))
        });
        wait_settled(&task).await;

        assert_eq!(task.status(), TaskStatus::Rejected);
        assert_eq!(
            task.outcome(),
            Some(&Outcome::Rejected("database unavailable".to_string()))
        );
    }

    #[tokio::test]
    async fn panic_rejects_with_message() {
        let task: PollableTask<u32> = PollableTask::spawn(&Handle::current(), async {
            if true {
                panic!("handler exploded");
            }
            Ok(1)
        });
        wait_settled(&task).await;

        assert_eq!(
            task.outcome(),
            Some(&Outcome::Rejected("handler exploded".to_string()))
        );
    }

    #[tokio::test]
    async fn non_textual_panic_uses_fallback() {
        let task: PollableTask<u32> = PollableTask::spawn(&Handle::current(), async {
            if true {
                std::panic::panic_any(404u16);
            }
            Ok(1)
        });
        wait_settled(&task).await;

        assert_eq!(
            task.outcome(),
            Some(&Outcome::Rejected(UNKNOWN_ERROR.to_string()))
        );
    }

    #[test]
    fn settled_task_is_ready_on_first_poll() {
        let task = PollableTask::settled(Outcome::Fulfilled(()));
        assert_eq!(task.status(), TaskStatus::Fulfilled);
        let polled = task.poll();
        let json = std::str::from_utf8(frame::decode(&polled).unwrap()).unwrap();
        assert_eq!(json, r#"{"t":"Fulfilled","c":null}"#);
    }

    #[test]
    fn custom_formatter_overrides_envelope() {
        let task = PollableTask::settled(Outcome::Fulfilled(3u8)).with_formatter(|outcome| {
            match outcome {
                Some(Outcome::Fulfilled(n)) => frame::encode(&format!("{{\"n\":{n}}}")),
                _ => frame::encode(""),
            }
        });
        assert_eq!(task.poll(), b"7{\"n\":3}".to_vec());
    }

    #[tokio::test]
    async fn poll_from_another_thread_observes_settlement() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let task = PollableTask::spawn(&Handle::current(), async move { Ok(rx.await?) });

        let remote = task.clone();
        let poller = std::thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                let frame = Pollable::poll_frame(&remote);
                if !frame::is_empty_frame(&frame) {
                    return frame;
                }
                assert!(Instant::now() < deadline, "remote poller timed out");
                std::thread::sleep(Duration::from_millis(1));
            }
        });

        tx.send(11).unwrap();
        wait_settled(&task).await;

        let frame = poller.join().unwrap();
        assert_eq!(frame, task.poll());
        assert_eq!(Outcome::<u32>::from_frame(&frame).unwrap(), Some(Outcome::Fulfilled(11)));
    }
}
