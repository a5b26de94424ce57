//! C ABI exported to the native runtime.
//!
//! All exports resolve handles through the globally installed
//! [`Bridge`]. With no bridge installed, or for an unknown handle, they
//! return `0` / null / `false`. No export ever unwinds into the caller.
//!
//! | export              | returns                                   |
//! |---------------------|-------------------------------------------|
//! | `alloy_invoke`      | task handle                               |
//! | `alloy_poll`        | owned frame, free with `alloy_free_frame` |
//! | `alloy_free_frame`  | nothing                                   |
//! | `alloy_read_stream` | chunk task handle                         |
//! | `alloy_release`     | whether the handle was live               |

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use alloy_core::{Bridge, Handle};

static BRIDGE: RwLock<Option<Arc<Bridge>>> = RwLock::new(None);

/// Make `bridge` the target of the C exports. Returns the bridge it
/// replaced, if any.
pub(crate) fn install(bridge: Arc<Bridge>) -> Option<Arc<Bridge>> {
    BRIDGE
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(bridge)
}

/// Remove `bridge` if it is the installed one.
pub(crate) fn uninstall(bridge: &Arc<Bridge>) -> bool {
    let mut slot = BRIDGE.write().unwrap_or_else(PoisonError::into_inner);
    match slot.as_ref() {
        Some(current) if Arc::ptr_eq(current, bridge) => {
            *slot = None;
            true
        }
        _ => false,
    }
}

fn current() -> Option<Arc<Bridge>> {
    let bridge = BRIDGE.read().unwrap_or_else(PoisonError::into_inner).clone();
    if bridge.is_none() {
        tracing::warn!("native call with no bridge installed");
    }
    bridge
}

/// Run `f`, turning a panic into `fallback`.
fn guarded<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!("panic in native export");
        fallback
    })
}

/// Invoke a handler with a serialized request.
///
/// Returns the task handle, or `0` if `handler` is not a live handler
/// handle.
///
/// # Safety
///
/// `request_ptr` must point to `request_len` readable bytes, or be null
/// when `request_len` is `0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn alloy_invoke(
    handler: u64,
    request_ptr: *const u8,
    request_len: usize,
) -> u64 {
    let request: &[u8] = if request_len == 0 {
        &[]
    } else if request_ptr.is_null() {
        return 0;
    } else {
        // SAFETY: the caller guarantees `request_len` readable bytes.
        unsafe { std::slice::from_raw_parts(request_ptr, request_len) }
    };

    guarded(0, || {
        let Some(bridge) = current() else { return 0 };
        bridge
            .invoke(Handle::from_raw(handler), request)
            .map_or(0, Handle::as_raw)
    })
}

/// Poll a task.
///
/// Returns an owned frame and writes its length to `out_len`, or returns
/// null if `task` is not a live task handle. The frame must be handed back
/// to [`alloy_free_frame`].
///
/// # Safety
///
/// `out_len` must be a valid pointer to a writable `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn alloy_poll(task: u64, out_len: *mut usize) -> *mut u8 {
    if out_len.is_null() {
        return std::ptr::null_mut();
    }

    let frame = guarded(None, || {
        let bridge = current()?;
        bridge.poll(Handle::from_raw(task)).ok()
    });
    let Some(frame) = frame else {
        return std::ptr::null_mut();
    };

    let frame = frame.into_boxed_slice();
    // SAFETY: checked non-null above, the caller guarantees it is writable.
    unsafe { *out_len = frame.len() };
    Box::into_raw(frame).cast::<u8>()
}

/// Free a frame returned by [`alloy_poll`].
///
/// # Safety
///
/// `ptr` and `len` must come from one `alloy_poll` call, and the frame
/// must not be freed twice.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn alloy_free_frame(ptr: *mut u8, len: usize) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: `ptr`/`len` describe a boxed slice leaked by `alloy_poll`.
    drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)) });
}

/// Start reading the next chunk of a streaming body.
///
/// Returns the chunk task handle, or `0` if `reader` is not a live reader
/// handle.
#[unsafe(no_mangle)]
pub extern "C" fn alloy_read_stream(reader: u64) -> u64 {
    guarded(0, || {
        let Some(bridge) = current() else { return 0 };
        bridge
            .read_stream(Handle::from_raw(reader))
            .map_or(0, Handle::as_raw)
    })
}

/// Release any handle. Returns `false` if it was not live.
#[unsafe(no_mangle)]
pub extern "C" fn alloy_release(handle: u64) -> bool {
    guarded(false, || {
        current().is_some_and(|bridge| bridge.release(Handle::from_raw(handle)))
    })
}
