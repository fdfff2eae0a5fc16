//! Context lifecycle: create, retain, release, introspect.
//!
//! A [`Context`] owns exactly one native reference. Retaining yields another
//! owned `Context` for the same native object; releasing consumes one. The
//! last release destroys the native object, after which no handle to it
//! remains in safe code.

use std::fmt;
use std::sync::Arc;

use clcontext_status::{ClError, ErrorKind, Result, check};
use tracing::{debug, info, warn};

use crate::info::{ContextInfo, ContextInfoParam};
use crate::runtime::{NativeRuntime, NotifyCallback};
use crate::types::{ContextProperty, DeviceId, DeviceType, PlatformId, RawContext};

/// Entry point for context operations against one native runtime.
#[derive(Clone)]
pub struct ContextManager {
    runtime: Arc<dyn NativeRuntime>,
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager").field("runtime", &self.runtime.name()).finish()
    }
}

impl ContextManager {
    pub fn new(runtime: Arc<dyn NativeRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<dyn NativeRuntime> {
        &self.runtime
    }

    /// Platforms reported by the runtime's discovery facility.
    pub fn platforms(&self) -> Result<Vec<PlatformId>> {
        self.runtime.platform_ids().map_err(translate)
    }

    /// Devices of `device_type` on `platform`.
    pub fn devices(&self, platform: PlatformId, device_type: DeviceType) -> Result<Vec<DeviceId>> {
        self.runtime.device_ids(platform, device_type).map_err(translate)
    }

    /// The platform version string, which identifies the driver build.
    pub fn platform_version(&self, platform: PlatformId) -> Result<String> {
        self.runtime.platform_version(platform).map_err(translate)
    }

    /// Create a context on an explicit list of devices.
    ///
    /// Absent or empty `devices` is a caller error. Which status the driver
    /// reports for it differs between drivers and is passed through as-is.
    pub fn create_context(
        &self,
        properties: Option<&[ContextProperty]>,
        devices: Option<&[DeviceId]>,
        notify: Option<NotifyCallback>,
    ) -> Result<Context> {
        let raw_properties = properties.map(ContextProperty::encode_list);
        debug!(
            properties = properties.map_or(0, <[_]>::len),
            devices = devices.map_or(0, <[_]>::len),
            "clCreateContext"
        );
        let raw = self
            .runtime
            .create_context(raw_properties.as_deref(), devices, notify)
            .map_err(translate)?;
        info!(context = %raw, runtime = self.runtime.name(), "context created");
        Ok(Context::adopt(raw, Arc::clone(&self.runtime)))
    }

    /// Create a context on every device matching `device_type`.
    ///
    /// A zero or unknown mask is a caller error; drivers disagree on whether
    /// it yields `InvalidDeviceType`, `InvalidDevice`, or `DeviceNotFound`.
    pub fn create_context_from_type(
        &self,
        properties: Option<&[ContextProperty]>,
        device_type: DeviceType,
        notify: Option<NotifyCallback>,
    ) -> Result<Context> {
        let raw_properties = properties.map(ContextProperty::encode_list);
        debug!(%device_type, "clCreateContextFromType");
        let raw = self
            .runtime
            .create_context_from_type(raw_properties.as_deref(), device_type, notify)
            .map_err(translate)?;
        info!(context = %raw, runtime = self.runtime.name(), %device_type, "context created");
        Ok(Context::adopt(raw, Arc::clone(&self.runtime)))
    }

    /// Add a native reference to `context`, returned as a new owned handle.
    pub fn retain_context(&self, context: &Context) -> Result<Context> {
        context.retain()
    }

    /// Give up one native reference. The last release destroys the context.
    pub fn release_context(&self, context: Context) -> Result<()> {
        context.release()
    }

    pub fn get_context_info(
        &self,
        context: &Context,
        param: ContextInfoParam,
    ) -> Result<ContextInfo> {
        context.info(param)
    }

    /// Query by raw key. The key reaches the runtime as a native
    /// `cl_context_info` (negative keys wrap as they would in C), so an
    /// unknown key fails with whatever the runtime reports. Keys that do not
    /// fit the native width, or that the runtime answers without a typed
    /// shape, fail with `InvalidValue`.
    pub fn get_context_info_raw(&self, context: &Context, key: i64) -> Result<ContextInfo> {
        let native_key = match i32::try_from(key) {
            Ok(key) => key as u32,
            Err(_) => u32::try_from(key).map_err(|_| {
                debug!(key, "context info key wider than cl_context_info");
                ClError::Native(ErrorKind::InvalidValue)
            })?,
        };
        let bytes = context.runtime.context_info(context.raw, native_key).map_err(translate)?;
        match ContextInfoParam::from_key(i64::from(native_key)) {
            Some(param) => ContextInfo::decode(param, &bytes),
            None => {
                debug!(key, "runtime answered a context info key with no typed shape");
                Err(ClError::Native(ErrorKind::InvalidValue))
            }
        }
    }
}

/// One owned native reference to an OpenCL context.
///
/// Dropping an unreleased `Context` releases its reference; a failure there
/// is logged, since `Drop` cannot report it.
pub struct Context {
    raw: RawContext,
    runtime: Arc<dyn NativeRuntime>,
    released: bool,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("raw", &self.raw)
            .field("runtime", &self.runtime.name())
            .finish()
    }
}

impl Context {
    fn adopt(raw: RawContext, runtime: Arc<dyn NativeRuntime>) -> Self {
        Self { raw, runtime, released: false }
    }

    /// The native handle. Valid for as long as `self` lives.
    pub fn raw(&self) -> RawContext {
        self.raw
    }

    /// Whether both handles refer to the same native context.
    pub fn same_native(&self, other: &Context) -> bool {
        self.raw == other.raw && Arc::ptr_eq(&self.runtime, &other.runtime)
    }

    pub fn retain(&self) -> Result<Context> {
        check(self.runtime.retain_context(self.raw))?;
        debug!(context = %self.raw, "context retained");
        Ok(Context::adopt(self.raw, Arc::clone(&self.runtime)))
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        check(self.runtime.release_context(self.raw))?;
        debug!(context = %self.raw, "context released");
        Ok(())
    }

    /// Read one attribute from the runtime. Never mutates the context.
    pub fn info(&self, param: ContextInfoParam) -> Result<ContextInfo> {
        let bytes = self.runtime.context_info(self.raw, param.key()).map_err(translate)?;
        ContextInfo::decode(param, &bytes)
    }

    /// The runtime's current reference count for this context.
    pub fn reference_count(&self) -> Result<u32> {
        match self.info(ContextInfoParam::ReferenceCount)? {
            ContextInfo::ReferenceCount(count) => Ok(count),
            other => Err(shape_mismatch(&other)),
        }
    }

    pub fn devices(&self) -> Result<Vec<DeviceId>> {
        match self.info(ContextInfoParam::Devices)? {
            ContextInfo::Devices(devices) => Ok(devices),
            other => Err(shape_mismatch(&other)),
        }
    }

    pub fn num_devices(&self) -> Result<u32> {
        match self.info(ContextInfoParam::NumDevices)? {
            ContextInfo::NumDevices(count) => Ok(count),
            other => Err(shape_mismatch(&other)),
        }
    }

    /// The property list supplied at creation; empty if none was.
    pub fn properties(&self) -> Result<Vec<ContextProperty>> {
        match self.info(ContextInfoParam::Properties)? {
            ContextInfo::Properties(properties) => Ok(properties),
            other => Err(shape_mismatch(&other)),
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = check(self.runtime.release_context(self.raw)) {
            warn!(context = %self.raw, error = %e, "failed to release context on drop");
        }
    }
}

fn translate(status: clcontext_status::Status) -> ClError {
    match check(status) {
        Err(e) => e,
        // A runtime that fails with status 0 has broken the native contract.
        Ok(()) => ClError::UnknownStatus(status),
    }
}

fn shape_mismatch(info: &ContextInfo) -> ClError {
    warn!(param = %info.param(), "decoded context info has an unexpected shape");
    ClError::Native(ErrorKind::InvalidValue)
}
