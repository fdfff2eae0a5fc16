//! System OpenCL backend.
//!
//! Discovery goes through `opencl3`; the context calls go straight to the
//! `cl3` entry points so that statuses reach [`crate::ContextManager`]
//! untouched.

use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_void};
use std::ptr;
use std::sync::Mutex;

use cl3::context as cl;
use cl3::types::{cl_context, cl_context_properties, cl_device_id};
use clcontext_status::{SUCCESS, Status};
use opencl3::platform::{Platform, get_platforms};
use tracing::{debug, warn};

use crate::info::{ContextInfo, ContextInfoParam};
use crate::runtime::{NativeRuntime, NotifyCallback};
use crate::types::{DeviceId, DeviceType, PlatformId, RawContext};

type NotifyBox = Box<NotifyCallback>;

/// Native runtime backed by the installed OpenCL ICD loader.
///
/// Notify callbacks are boxed and handed to the driver as `user_data`. The
/// box stays registered until the release that takes the context to zero.
#[derive(Debug, Default)]
pub struct OpenClRuntime {
    callbacks: Mutex<HashMap<RawContext, usize>>,
}

impl OpenClRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, context: RawContext, user_data: *mut c_void) {
        if user_data.is_null() {
            return;
        }
        let mut callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        callbacks.insert(context, user_data as usize);
    }

    fn unregister(&self, context: RawContext) {
        let slot = {
            let mut callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
            callbacks.remove(&context)
        };
        if let Some(addr) = slot {
            // SAFETY: `addr` came from `Box::into_raw` in `notify_parts` and the
            // driver holds no further reference once the context is destroyed.
            drop(unsafe { Box::from_raw(addr as *mut NotifyCallback) });
        }
    }

    fn is_registered(&self, context: RawContext) -> bool {
        self.callbacks.lock().unwrap_or_else(|e| e.into_inner()).contains_key(&context)
    }

    fn current_count(&self, context: RawContext) -> Option<u32> {
        let bytes = self.context_info(context, ContextInfoParam::ReferenceCount.key()).ok()?;
        ContextInfo::decode(ContextInfoParam::ReferenceCount, &bytes)
            .ok()
            .and_then(|info| info.as_reference_count())
    }
}

/// What a successful release means for a context's notify callback, given
/// the reference count read just before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallbackFate {
    /// The release destroyed the context; the driver no longer holds `user_data`.
    Reclaim,
    /// Other references remain.
    Keep,
    /// The count could not be read. Freeing could race a live context.
    Unknown,
}

fn callback_fate(count_before: Option<u32>) -> CallbackFate {
    match count_before {
        Some(1) => CallbackFate::Reclaim,
        Some(_) => CallbackFate::Keep,
        None => CallbackFate::Unknown,
    }
}

type PfnNotify = unsafe extern "C" fn(*const c_char, *const c_void, usize, *mut c_void);

unsafe extern "C" fn notify_trampoline(
    errinfo: *const c_char,
    _private_info: *const c_void,
    _cb: usize,
    user_data: *mut c_void,
) {
    if user_data.is_null() || errinfo.is_null() {
        return;
    }
    // SAFETY: the driver passes back the `user_data` registered at creation,
    // which points at a live `NotifyCallback`; `errinfo` is NUL-terminated.
    let (callback, message) = unsafe {
        (&*(user_data as *const NotifyCallback), CStr::from_ptr(errinfo).to_string_lossy())
    };
    callback(&message);
}

fn notify_parts(notify: Option<NotifyCallback>) -> (Option<PfnNotify>, *mut c_void) {
    match notify {
        Some(callback) => {
            let boxed: NotifyBox = Box::new(callback);
            (Some(notify_trampoline as PfnNotify), Box::into_raw(boxed).cast::<c_void>())
        }
        None => (None, ptr::null_mut()),
    }
}

fn reclaim(user_data: *mut c_void) {
    if !user_data.is_null() {
        // SAFETY: produced by `notify_parts` and never handed to a live context.
        drop(unsafe { Box::from_raw(user_data.cast::<NotifyCallback>()) });
    }
}

fn properties_ptr(properties: Option<&[isize]>) -> *const cl_context_properties {
    properties.map_or(ptr::null(), <[isize]>::as_ptr)
}

fn to_handle(context: RawContext) -> cl_context {
    context.raw() as cl_context
}

fn from_handle(context: cl_context) -> RawContext {
    RawContext::from_raw(context as usize)
}

impl NativeRuntime for OpenClRuntime {
    fn name(&self) -> &str {
        "opencl"
    }

    fn platform_ids(&self) -> Result<Vec<PlatformId>, Status> {
        let platforms = get_platforms().map_err(|e| e.0)?;
        Ok(platforms.iter().map(|p| PlatformId::from_raw(p.id() as usize)).collect())
    }

    fn device_ids(
        &self,
        platform: PlatformId,
        device_type: DeviceType,
    ) -> Result<Vec<DeviceId>, Status> {
        let platform = Platform::new(platform.raw() as _);
        let ids = platform.get_devices(device_type.bits()).map_err(|e| e.0)?;
        Ok(ids.into_iter().map(|id| DeviceId::from_raw(id as usize)).collect())
    }

    fn platform_version(&self, platform: PlatformId) -> Result<String, Status> {
        Platform::new(platform.raw() as _).version().map_err(|e| e.0)
    }

    fn create_context(
        &self,
        properties: Option<&[isize]>,
        devices: Option<&[DeviceId]>,
        notify: Option<NotifyCallback>,
    ) -> Result<RawContext, Status> {
        let device_handles: Vec<cl_device_id> =
            devices.unwrap_or_default().iter().map(|d| d.raw() as cl_device_id).collect();
        let (pfn, user_data) = notify_parts(notify);
        // SAFETY: the property list is zero-terminated by `ContextProperty::encode_list`,
        // device handles come from discovery, and `user_data` matches `pfn`.
        let created = unsafe {
            cl::create_context(&device_handles, properties_ptr(properties), pfn, user_data)
        };
        match created {
            Ok(handle) => {
                let context = from_handle(handle);
                self.register(context, user_data);
                Ok(context)
            }
            Err(status) => {
                reclaim(user_data);
                Err(status)
            }
        }
    }

    fn create_context_from_type(
        &self,
        properties: Option<&[isize]>,
        device_type: DeviceType,
        notify: Option<NotifyCallback>,
    ) -> Result<RawContext, Status> {
        let (pfn, user_data) = notify_parts(notify);
        // SAFETY: as in `create_context`.
        let created = unsafe {
            cl::create_context_from_type(
                device_type.bits(),
                properties_ptr(properties),
                pfn,
                user_data,
            )
        };
        match created {
            Ok(handle) => {
                let context = from_handle(handle);
                self.register(context, user_data);
                Ok(context)
            }
            Err(status) => {
                reclaim(user_data);
                Err(status)
            }
        }
    }

    fn retain_context(&self, context: RawContext) -> Status {
        // SAFETY: `context` is a handle this runtime created and still holds.
        match unsafe { cl::retain_context(to_handle(context)) } {
            Ok(()) => SUCCESS,
            Err(status) => status,
        }
    }

    fn release_context(&self, context: RawContext) -> Status {
        let fate = callback_fate(self.current_count(context));
        // SAFETY: `context` is a handle this runtime created and still holds.
        match unsafe { cl::release_context(to_handle(context)) } {
            Ok(()) => {
                match fate {
                    CallbackFate::Reclaim => {
                        debug!(%context, "context destroyed");
                        self.unregister(context);
                    }
                    CallbackFate::Keep => {}
                    CallbackFate::Unknown if self.is_registered(context) => {
                        warn!(
                            %context,
                            "reference count unavailable before release; notify callback is leaked"
                        );
                    }
                    CallbackFate::Unknown => {}
                }
                SUCCESS
            }
            Err(status) => {
                warn!(%context, status, "clReleaseContext failed");
                status
            }
        }
    }

    fn context_info(&self, context: RawContext, param: u32) -> Result<Vec<u8>, Status> {
        cl::get_context_data(to_handle(context), param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn trampoline_forwards_message_to_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let callback: NotifyCallback = Arc::new(move |msg: &str| {
            assert_eq!(msg, "out of resources");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let (pfn, user_data) = notify_parts(Some(callback));
        let message = c"out of resources";
        // SAFETY: user_data was produced by notify_parts above.
        unsafe { pfn.unwrap()(message.as_ptr(), ptr::null(), 0, user_data) };
        reclaim(user_data);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_notify_passes_null_user_data() {
        let (pfn, user_data) = notify_parts(None);
        assert!(pfn.is_none());
        assert!(user_data.is_null());
    }

    #[test]
    fn callback_reclaimed_only_on_last_release() {
        assert_eq!(callback_fate(Some(1)), CallbackFate::Reclaim);
        assert_eq!(callback_fate(Some(3)), CallbackFate::Keep);
        assert_eq!(callback_fate(None), CallbackFate::Unknown);
    }

    #[test]
    fn registry_tracks_contexts_with_callbacks() {
        let runtime = OpenClRuntime::new();
        let context = RawContext::from_raw(0x42);
        let callback: NotifyCallback = Arc::new(|_: &str| {});
        let (_, user_data) = notify_parts(Some(callback));

        runtime.register(context, user_data);
        assert!(runtime.is_registered(context));
        runtime.unregister(context);
        assert!(!runtime.is_registered(context));

        runtime.register(RawContext::from_raw(0x43), ptr::null_mut());
        assert!(!runtime.is_registered(RawContext::from_raw(0x43)));
    }

    #[test]
    #[ignore = "requires an OpenCL ICD loader and at least one platform"]
    fn discovers_system_platforms() {
        let runtime = OpenClRuntime::new();
        let platforms = runtime.platform_ids().expect("platforms");
        assert!(!platforms.is_empty());
        let version = runtime.platform_version(platforms[0]).expect("version");
        assert!(version.starts_with("OpenCL"));
    }
}
