//! In-process reference runtime.
//!
//! `SimulatedRuntime` behaves like an OpenCL driver for the context API:
//! it owns the reference counts, validates arguments, and answers info
//! queries with native byte layouts. A [`DriverProfile`] selects which status
//! the driver reports for the arguments real drivers disagree on, so the
//! quirk handling of the test suite can run without hardware.

use std::collections::HashMap;
use std::sync::Mutex;

use clcontext_status::{ErrorKind, SUCCESS, Status};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::info::{ContextInfo, ContextInfoParam};
use crate::runtime::{NativeRuntime, NotifyCallback};
use crate::types::{ContextProperty, DeviceId, DeviceType, PlatformId, RawContext};

const PLATFORM_BASE: usize = 0x1000;
const DEVICE_BASE: usize = 0x2000;

/// Named driver behaviours, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverProfileKind {
    /// Reports the statuses the OpenCL specification prescribes.
    Conformant,
    /// Apple OpenCL 1.2 from December 2014.
    Apple2014,
    /// AMD APP SDK 1642.5.
    AmdApp1642,
}

impl std::fmt::Display for DriverProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conformant => write!(f, "conformant"),
            Self::Apple2014 => write!(f, "apple-2014"),
            Self::AmdApp1642 => write!(f, "amd-app-1642"),
        }
    }
}

impl std::str::FromStr for DriverProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conformant" => Ok(Self::Conformant),
            "apple-2014" => Ok(Self::Apple2014),
            "amd-app-1642" => Ok(Self::AmdApp1642),
            other => Err(format!("unknown driver profile: {other}")),
        }
    }
}

/// How a simulated driver identifies itself and answers contested arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverProfile {
    pub kind: DriverProfileKind,
    /// Reported as the platform version string.
    pub platform_version: String,
    /// Status for `create_context` with absent or empty devices.
    pub missing_devices_status: Status,
    /// Status for `create_context_from_type` with a zero or unknown mask.
    pub invalid_device_type_status: Status,
    /// OS the driver shipped on; `None` runs as the host OS.
    pub host_os: Option<String>,
}

impl DriverProfile {
    pub fn conformant() -> Self {
        Self {
            kind: DriverProfileKind::Conformant,
            platform_version: "OpenCL 3.0 clcontext-sim".to_string(),
            missing_devices_status: ErrorKind::InvalidValue.code(),
            invalid_device_type_status: ErrorKind::InvalidDeviceType.code(),
            host_os: None,
        }
    }

    pub fn apple_2014() -> Self {
        Self {
            kind: DriverProfileKind::Apple2014,
            platform_version: "OpenCL 1.2 (Dec 14 2014 22:29:47)".to_string(),
            missing_devices_status: ErrorKind::InvalidDevice.code(),
            invalid_device_type_status: ErrorKind::InvalidDevice.code(),
            host_os: Some("darwin".to_string()),
        }
    }

    pub fn amd_app_1642() -> Self {
        Self {
            kind: DriverProfileKind::AmdApp1642,
            platform_version: "OpenCL 2.0 AMD-APP (1642.5)".to_string(),
            missing_devices_status: ErrorKind::InvalidValue.code(),
            invalid_device_type_status: ErrorKind::DeviceNotFound.code(),
            host_os: Some("linux".to_string()),
        }
    }

    pub fn from_kind(kind: DriverProfileKind) -> Self {
        match kind {
            DriverProfileKind::Conformant => Self::conformant(),
            DriverProfileKind::Apple2014 => Self::apple_2014(),
            DriverProfileKind::AmdApp1642 => Self::amd_app_1642(),
        }
    }
}

impl Default for DriverProfile {
    fn default() -> Self {
        Self::conformant()
    }
}

#[derive(Debug)]
struct SimDevice {
    id: DeviceId,
    class: DeviceType,
}

struct ContextRecord {
    reference_count: u32,
    devices: Vec<DeviceId>,
    properties: Vec<ContextProperty>,
    notify: Option<NotifyCallback>,
}

struct State {
    next_handle: usize,
    contexts: HashMap<RawContext, ContextRecord>,
}

/// A single-platform simulated OpenCL driver.
pub struct SimulatedRuntime {
    profile: DriverProfile,
    platform: PlatformId,
    devices: Vec<SimDevice>,
    state: Mutex<State>,
}

impl std::fmt::Debug for SimulatedRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedRuntime")
            .field("profile", &self.profile.kind)
            .field("platform", &self.platform)
            .field("devices", &self.devices.len())
            .field("live_contexts", &self.live_contexts())
            .finish()
    }
}

impl SimulatedRuntime {
    /// One GPU and one CPU device on a single platform.
    pub fn new(profile: DriverProfile) -> Self {
        Self::with_devices(profile, &[DeviceType::GPU, DeviceType::CPU])
    }

    /// One device per entry of `classes`, in order.
    pub fn with_devices(profile: DriverProfile, classes: &[DeviceType]) -> Self {
        let devices = classes
            .iter()
            .enumerate()
            .map(|(i, class)| SimDevice { id: DeviceId::from_raw(DEVICE_BASE + i), class: *class })
            .collect();
        info!(
            profile = %profile.kind,
            devices = classes.len(),
            "simulated OpenCL runtime ready"
        );
        Self {
            profile,
            platform: PlatformId::from_raw(PLATFORM_BASE),
            devices,
            state: Mutex::new(State { next_handle: 1, contexts: HashMap::new() }),
        }
    }

    pub fn profile(&self) -> &DriverProfile {
        &self.profile
    }

    /// Number of native contexts not yet destroyed.
    pub fn live_contexts(&self) -> usize {
        self.lock().contexts.len()
    }

    /// Invoke the notify callback registered for `context`, as a driver would
    /// on an asynchronous error. Returns whether a callback ran.
    pub fn report_error(&self, context: RawContext, message: &str) -> bool {
        let callback = self.lock().contexts.get(&context).and_then(|r| r.notify.clone());
        match callback {
            Some(callback) => {
                callback(message);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn validate_properties(&self, raw: Option<&[isize]>) -> Result<Vec<ContextProperty>, Status> {
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        let properties = ContextProperty::decode_list(raw).map_err(|e| e.status())?;
        let mut seen = Vec::with_capacity(properties.len());
        for property in &properties {
            if seen.contains(&property.key()) {
                return Err(ErrorKind::InvalidProperty.code());
            }
            seen.push(property.key());
            match property {
                ContextProperty::Platform(id) if *id != self.platform => {
                    return Err(ErrorKind::InvalidPlatform.code());
                }
                _ => {}
            }
        }
        Ok(properties)
    }

    fn insert(
        &self,
        devices: Vec<DeviceId>,
        properties: Vec<ContextProperty>,
        notify: Option<NotifyCallback>,
    ) -> RawContext {
        let mut state = self.lock();
        let handle = RawContext::from_raw(state.next_handle);
        state.next_handle += 1;
        debug!(context = %handle, devices = devices.len(), "simulated context created");
        let record = ContextRecord { reference_count: 1, devices, properties, notify };
        state.contexts.insert(handle, record);
        handle
    }
}

impl NativeRuntime for SimulatedRuntime {
    fn name(&self) -> &str {
        "simulated"
    }

    fn platform_ids(&self) -> Result<Vec<PlatformId>, Status> {
        Ok(vec![self.platform])
    }

    fn device_ids(
        &self,
        platform: PlatformId,
        device_type: DeviceType,
    ) -> Result<Vec<DeviceId>, Status> {
        if platform != self.platform {
            return Err(ErrorKind::InvalidPlatform.code());
        }
        if !device_type.is_valid() {
            return Err(ErrorKind::InvalidDeviceType.code());
        }
        let ids: Vec<DeviceId> = if device_type == DeviceType::DEFAULT {
            self.devices.first().map(|d| d.id).into_iter().collect()
        } else {
            self.devices.iter().filter(|d| device_type.selects(d.class)).map(|d| d.id).collect()
        };
        if ids.is_empty() {
            return Err(ErrorKind::DeviceNotFound.code());
        }
        Ok(ids)
    }

    fn platform_version(&self, platform: PlatformId) -> Result<String, Status> {
        if platform != self.platform {
            return Err(ErrorKind::InvalidPlatform.code());
        }
        Ok(self.profile.platform_version.clone())
    }

    fn create_context(
        &self,
        properties: Option<&[isize]>,
        devices: Option<&[DeviceId]>,
        notify: Option<NotifyCallback>,
    ) -> Result<RawContext, Status> {
        let properties = self.validate_properties(properties)?;
        let devices = match devices {
            Some(devices) if !devices.is_empty() => devices,
            _ => return Err(self.profile.missing_devices_status),
        };
        if devices.iter().any(|id| !self.devices.iter().any(|d| d.id == *id)) {
            return Err(ErrorKind::InvalidDevice.code());
        }
        Ok(self.insert(devices.to_vec(), properties, notify))
    }

    fn create_context_from_type(
        &self,
        properties: Option<&[isize]>,
        device_type: DeviceType,
        notify: Option<NotifyCallback>,
    ) -> Result<RawContext, Status> {
        let properties = self.validate_properties(properties)?;
        if !device_type.is_valid() {
            return Err(self.profile.invalid_device_type_status);
        }
        let devices = self.device_ids(self.platform, device_type)?;
        Ok(self.insert(devices, properties, notify))
    }

    fn retain_context(&self, context: RawContext) -> Status {
        match self.lock().contexts.get_mut(&context) {
            Some(record) => {
                record.reference_count += 1;
                SUCCESS
            }
            None => ErrorKind::InvalidContext.code(),
        }
    }

    fn release_context(&self, context: RawContext) -> Status {
        let mut state = self.lock();
        let Some(record) = state.contexts.get_mut(&context) else {
            return ErrorKind::InvalidContext.code();
        };
        record.reference_count -= 1;
        if record.reference_count == 0 {
            state.contexts.remove(&context);
            debug!(context = %context, "simulated context destroyed");
        }
        SUCCESS
    }

    fn context_info(&self, context: RawContext, param: u32) -> Result<Vec<u8>, Status> {
        let state = self.lock();
        let record = state.contexts.get(&context).ok_or(ErrorKind::InvalidContext.code())?;
        let param =
            ContextInfoParam::from_key(i64::from(param)).ok_or(ErrorKind::InvalidValue.code())?;
        let info = match param {
            ContextInfoParam::ReferenceCount => ContextInfo::ReferenceCount(record.reference_count),
            ContextInfoParam::Devices => ContextInfo::Devices(record.devices.clone()),
            ContextInfoParam::Properties => ContextInfo::Properties(record.properties.clone()),
            ContextInfoParam::NumDevices => {
                ContextInfo::NumDevices(u32::try_from(record.devices.len()).unwrap_or(u32::MAX))
            }
        };
        Ok(info.encode())
    }
}
