//! Handle registry: opaque integer handles for objects the native runtime
//! holds onto between calls.
//!
//! Handlers, tasks and stream readers never cross the boundary as pointers.
//! The native side only sees a [`Handle`], and every call resolves it here.
//! An entry lives until the native side releases its handle or the host
//! shuts down and clears the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};
use crate::handler::Handler;
use crate::stream::StreamReader;
use crate::task::Pollable;

/// Opaque reference to a registry entry. `0` is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    /// Reinterpret a raw integer received from the native side.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered object.
#[derive(Clone)]
pub enum Entry {
    Handler(Arc<dyn Handler>),
    Task(Arc<dyn Pollable>),
    Reader(Arc<StreamReader>),
}

impl Entry {
    pub fn kind(&self) -> &'static str {
        match self {
            Entry::Handler(_) => "handler",
            Entry::Task(_) => "task",
            Entry::Reader(_) => "stream reader",
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry::{}", self.kind())
    }
}

/// Thread-safe table of live handles.
///
/// Handles come from a monotonic counter starting at 1 and are never
/// reused within one registry.
pub struct HandleRegistry {
    entries: Mutex<HashMap<u64, Entry>>,
    next_handle: AtomicU64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Register `entry` and return its new handle.
    pub fn insert(&self, entry: Entry) -> Handle {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let kind = entry.kind();
        self.lock().insert(handle, entry);
        tracing::debug!(handle, kind, "registered handle");
        Handle(handle)
    }

    pub fn insert_handler(&self, handler: Arc<dyn Handler>) -> Handle {
        self.insert(Entry::Handler(handler))
    }

    pub fn insert_task(&self, task: impl Pollable + 'static) -> Handle {
        self.insert(Entry::Task(Arc::new(task)))
    }

    pub fn insert_reader(&self, reader: StreamReader) -> Handle {
        self.insert(Entry::Reader(Arc::new(reader)))
    }

    /// Resolve a handler handle.
    pub fn handler(&self, handle: Handle) -> BridgeResult<Arc<dyn Handler>> {
        match self.get(handle)? {
            Entry::Handler(handler) => Ok(handler),
            _ => Err(wrong_kind(handle, "handler")),
        }
    }

    /// Resolve a task handle.
    pub fn task(&self, handle: Handle) -> BridgeResult<Arc<dyn Pollable>> {
        match self.get(handle)? {
            Entry::Task(task) => Ok(task),
            _ => Err(wrong_kind(handle, "task")),
        }
    }

    /// Resolve a stream reader handle.
    pub fn reader(&self, handle: Handle) -> BridgeResult<Arc<StreamReader>> {
        match self.get(handle)? {
            Entry::Reader(reader) => Ok(reader),
            _ => Err(wrong_kind(handle, "stream reader")),
        }
    }

    /// Drop the entry behind `handle`. Returns `false` if it was not live.
    ///
    /// Releasing a task does not cancel its computation.
    pub fn release(&self, handle: Handle) -> bool {
        match self.lock().remove(&handle.0) {
            Some(entry) => {
                tracing::debug!(handle = handle.0, kind = entry.kind(), "released handle");
                true
            }
            None => {
                tracing::debug!(handle = handle.0, "release failed — unknown handle");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every entry. The handle counter keeps counting.
    pub fn clear(&self) {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(dropped, "cleared handle registry");
    }

    fn get(&self, handle: Handle) -> BridgeResult<Entry> {
        self.lock()
            .get(&handle.0)
            .cloned()
            .ok_or(BridgeError::UnknownHandle(handle))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_kind(handle: Handle, expected: &'static str) -> BridgeError {
    BridgeError::WrongKind { handle, expected }
}
