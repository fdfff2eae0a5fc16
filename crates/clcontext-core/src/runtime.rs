//! The seam between the lifecycle manager and the native OpenCL layer.
//!
//! Implementations speak raw native statuses; translation into
//! [`clcontext_status::ClError`] happens in [`crate::ContextManager`] so the
//! mapping lives in exactly one place.

use std::fmt;
use std::sync::Arc;

use clcontext_status::Status;

use crate::types::{DeviceId, DeviceType, PlatformId, RawContext};

/// Callback the runtime invokes with an error description for a context.
///
/// Stands in for the native `pfn_notify` + `user_data` pair: any user data is
/// captured by the closure.
pub type NotifyCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Raw native context API plus the platform/device discovery it relies on.
///
/// Discovery is an external collaborator: the identifiers it yields are
/// opaque and only ever handed back to the same runtime.
pub trait NativeRuntime: Send + Sync + fmt::Debug {
    /// Short human-readable name of the backend.
    fn name(&self) -> &str;

    // ── Discovery ────────────────────────────────────────────────────────

    fn platform_ids(&self) -> Result<Vec<PlatformId>, Status>;

    fn device_ids(&self, platform: PlatformId, device_type: DeviceType)
    -> Result<Vec<DeviceId>, Status>;

    /// The platform version string, which identifies the driver build.
    fn platform_version(&self, platform: PlatformId) -> Result<String, Status>;

    // ── Context API ──────────────────────────────────────────────────────

    /// `clCreateContext`. `properties` is the zero-terminated native list.
    fn create_context(
        &self,
        properties: Option<&[isize]>,
        devices: Option<&[DeviceId]>,
        notify: Option<NotifyCallback>,
    ) -> Result<RawContext, Status>;

    /// `clCreateContextFromType`.
    fn create_context_from_type(
        &self,
        properties: Option<&[isize]>,
        device_type: DeviceType,
        notify: Option<NotifyCallback>,
    ) -> Result<RawContext, Status>;

    /// `clRetainContext`.
    fn retain_context(&self, context: RawContext) -> Status;

    /// `clReleaseContext`.
    fn release_context(&self, context: RawContext) -> Status;

    /// `clGetContextInfo`, answering with the raw bytes for `param`.
    fn context_info(&self, context: RawContext, param: u32) -> Result<Vec<u8>, Status>;
}
