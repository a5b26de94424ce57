//! Handoff to the native HTTP runtime.
//!
//! At startup the host gives the native runtime the framed route table.
//! From then on the native side drives everything through the C exports
//! in [`crate::ffi`].

/// Entry point of a native runtime.
pub trait NativeRuntime {
    /// Start serving `routes`, a framed route table.
    ///
    /// `routes` is only valid for the duration of the call. Implementations
    /// copy what they need.
    fn start(&self, routes: &[u8]) -> anyhow::Result<()>;
}

impl<F> NativeRuntime for F
where
    F: Fn(&[u8]) -> anyhow::Result<()>,
{
    fn start(&self, routes: &[u8]) -> anyhow::Result<()> {
        self(routes)
    }
}

/// Signature of a native `start(routes_ptr, routes_len)` symbol.
pub type StartFn = extern "C" fn(*const u8, usize);

/// A native runtime reached through a C function pointer.
///
/// The call is fire-and-forget. The native side is expected to spawn its
/// own server and return.
#[derive(Debug, Clone, Copy)]
pub struct ExternStart {
    start: StartFn,
}

impl ExternStart {
    pub fn new(start: StartFn) -> Self {
        Self { start }
    }
}

impl NativeRuntime for ExternStart {
    fn start(&self, routes: &[u8]) -> anyhow::Result<()> {
        tracing::debug!(len = routes.len(), "calling native start");
        (self.start)(routes.as_ptr(), routes.len());
        Ok(())
    }
}
