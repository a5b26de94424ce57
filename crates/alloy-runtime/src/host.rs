//! The host: a cooperative scheduler on its own thread plus the bridge
//! that native calls land on.
//!
//! ```text
//!   native threads ──alloy_*──→ Bridge ──spawn──→ ┌─────────────────────┐
//!                                                 │ "alloy-host" thread │
//!                                                 │ current_thread rt   │
//!                                                 └─────────────────────┘
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use alloy_core::{Bridge, RouteTable, Routes};
use anyhow::Context;
use tokio::sync::oneshot;

use crate::config::HostConfig;
use crate::ffi;
use crate::native::NativeRuntime;

/// A running host.
///
/// Dropping the host shuts it down.
pub struct Host {
    bridge: Arc<Bridge>,
    config: HostConfig,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Host {
    /// Build the scheduler, start its thread and create the bridge.
    pub fn start(config: HostConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build host runtime")?;
        let handle = runtime.handle().clone();

        let (stop, stopped) = oneshot::channel::<()>();
        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                // Either an explicit stop or a dropped sender ends the loop.
                let _ = runtime.block_on(stopped);
                tracing::debug!("host scheduler stopped");
            })
            .with_context(|| format!("failed to spawn host thread {:?}", config.thread_name))?;

        let bridge = Arc::new(
            Bridge::new(handle, config.bridge.clone()).with_scheduler_thread(thread.thread().id()),
        );
        tracing::info!(
            thread = %config.thread_name,
            max_request_bytes = config.bridge.max_request_bytes,
            default_headers = config.bridge.default_headers.len(),
            "alloy host started"
        );

        Ok(Self {
            bridge,
            config,
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Register `routes` and hand the route table to `native`.
    pub fn serve(&self, routes: &Routes, native: &dyn NativeRuntime) -> anyhow::Result<RouteTable> {
        let table = routes.export(self.bridge.registry());
        let frame = table.to_frame().context("failed to serialize route table")?;
        tracing::info!(routes = routes.len(), len = frame.len(), "starting native runtime");
        native
            .start(&frame)
            .context("native runtime failed to start")?;
        Ok(table)
    }

    /// Route the C exports to this host's bridge.
    pub fn install_global(&self) {
        if ffi::install(Arc::clone(&self.bridge)).is_some() {
            tracing::warn!("replaced a previously installed bridge");
        }
    }

    /// Stop the scheduler thread, drop every handle and detach the C
    /// exports.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        ffi::uninstall(&self.bridge);
        let _ = stop.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("host thread panicked");
            }
        }
        let live = self.bridge.registry().len();
        self.bridge.registry().clear();
        tracing::info!(released = live, "alloy host shut down");
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.stop();
    }
}
