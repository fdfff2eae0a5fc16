//! Reference-counted OpenCL context lifecycle.
//!
//! This crate provides:
//! - [`ContextManager`] / [`Context`]: create, retain, release, and introspect
//!   contexts with every native status translated through
//!   [`clcontext_status`]
//! - [`NativeRuntime`]: the seam to the native layer, with an in-process
//!   [`SimulatedRuntime`] and, behind `opencl-runtime`, the system ICD
//! - [`RuntimeConfig`]: TOML configuration with `CLCONTEXT_*` overrides
//!
//! The reference count of a context belongs to the native runtime. Nothing in
//! this crate caches it; [`Context::reference_count`] always asks the runtime.

pub mod config;
pub mod context;
pub mod info;
#[cfg(feature = "opencl-runtime")]
pub mod opencl;
pub mod runtime;
pub mod simulated;
pub mod types;

pub use clcontext_status::{ClError, ErrorKind, Result};
pub use config::{Backend, ConfigError, RuntimeConfig, open_runtime};
pub use context::{Context, ContextManager};
pub use info::{ContextInfo, ContextInfoParam};
#[cfg(feature = "opencl-runtime")]
pub use opencl::OpenClRuntime;
pub use runtime::{NativeRuntime, NotifyCallback};
pub use simulated::{DriverProfile, DriverProfileKind, SimulatedRuntime};
pub use types::{ContextProperty, DeviceId, DeviceType, PlatformId, RawContext};
