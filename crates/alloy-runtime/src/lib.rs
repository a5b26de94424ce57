//! Alloy host runtime.
//!
//! Wraps [`alloy_core`] in what a deployable host needs: a scheduler thread
//! ([`Host`]), file configuration ([`HostConfig`]), tracing setup and the
//! C exports a native HTTP runtime links against.
//!
//! ```ignore
//! let config = HostConfig::from_file(Path::new("alloy.toml"))?;
//! telemetry::init_tracing(&config.log_filter, config.log_format);
//!
//! let host = Host::start(config)?;
//! host.install_global();
//! host.serve(&routes, &ExternStart::new(native_start))?;
//! ```

pub mod config;
pub mod ffi;
mod host;
mod native;
pub mod telemetry;

pub use config::{ConfigError, HostConfig, LogFormat};
pub use host::Host;
pub use native::{ExternStart, NativeRuntime, StartFn};

pub use alloy_core::{
    Body, BodySource, Handler, Header, HeaderMap, Method, Reply, Request, Response, RouteOptions,
    Routes,
};
