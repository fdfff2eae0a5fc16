//! Opaque identifiers, device-type masks, and context properties.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use clcontext_status::{ClError, ErrorKind};
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            /// Wrap a raw native handle value.
            pub const fn from_raw(raw: usize) -> Self {
                Self(raw)
            }

            /// The raw native handle value.
            pub const fn raw(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

opaque_id! {
    /// Opaque platform identifier produced by discovery.
    PlatformId
}

opaque_id! {
    /// Opaque device identifier produced by discovery.
    DeviceId
}

opaque_id! {
    /// Raw native context handle. Owned through [`crate::Context`].
    RawContext
}

/// Device-type bit mask (`cl_device_type`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceType(u64);

impl DeviceType {
    pub const DEFAULT: Self = Self(1 << 0);
    pub const CPU: Self = Self(1 << 1);
    pub const GPU: Self = Self(1 << 2);
    pub const ACCELERATOR: Self = Self(1 << 3);
    pub const CUSTOM: Self = Self(1 << 4);
    pub const ALL: Self = Self(0xFFFF_FFFF);

    const KNOWN: u64 = 0x1F;

    /// Wrap raw bits without validation; invalid masks are the runtime's to reject.
    pub const fn from_bits_retain(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether the mask is non-zero and names only known device classes.
    pub const fn is_valid(self) -> bool {
        self.0 == Self::ALL.0 || (self.0 != 0 && self.0 & !Self::KNOWN == 0)
    }

    /// Whether `self` selects a device of class `class`.
    pub const fn selects(self, class: DeviceType) -> bool {
        self.0 & class.0 != 0
    }
}

impl BitOr for DeviceType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceType({self})")
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ALL => f.write_str("all"),
            Self::DEFAULT => f.write_str("default"),
            Self::CPU => f.write_str("cpu"),
            Self::GPU => f.write_str("gpu"),
            Self::ACCELERATOR => f.write_str("accelerator"),
            Self::CUSTOM => f.write_str("custom"),
            Self(bits) => write!(f, "{bits:#x}"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::ALL),
            "default" => Ok(Self::DEFAULT),
            "cpu" => Ok(Self::CPU),
            "gpu" => Ok(Self::GPU),
            "accelerator" => Ok(Self::ACCELERATOR),
            "custom" => Ok(Self::CUSTOM),
            other => match other.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16)
                    .map(Self)
                    .map_err(|e| format!("invalid device type mask '{s}': {e}")),
                None => other
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| format!("unknown device type: {s}")),
            },
        }
    }
}

impl TryFrom<String> for DeviceType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceType> for String {
    fn from(value: DeviceType) -> Self {
        value.to_string()
    }
}

/// `CL_CONTEXT_PLATFORM`.
pub const CONTEXT_PLATFORM: isize = 0x1084;
/// `CL_CONTEXT_INTEROP_USER_SYNC`.
pub const CONTEXT_INTEROP_USER_SYNC: isize = 0x1085;

/// One key/value entry of a context property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextProperty {
    /// Select the platform the context is created on.
    Platform(PlatformId),
    /// Whether the user is responsible for GL/CL synchronisation.
    InteropUserSync(bool),
    /// Any other key, such as a vendor or GL sharing property, passed through as is.
    Other { key: isize, value: isize },
}

impl ContextProperty {
    pub const fn key(self) -> isize {
        match self {
            Self::Platform(_) => CONTEXT_PLATFORM,
            Self::InteropUserSync(_) => CONTEXT_INTEROP_USER_SYNC,
            Self::Other { key, .. } => key,
        }
    }

    pub const fn value(self) -> isize {
        match self {
            Self::Platform(id) => id.raw() as isize,
            Self::InteropUserSync(sync) => sync as isize,
            Self::Other { value, .. } => value,
        }
    }

    /// Encode as the native zero-terminated `[key, value, …, 0]` list.
    pub fn encode_list(properties: &[ContextProperty]) -> Vec<isize> {
        let mut raw = Vec::with_capacity(properties.len() * 2 + 1);
        for property in properties {
            raw.push(property.key());
            raw.push(property.value());
        }
        raw.push(0);
        raw
    }

    /// Decode a native property list. Stops at the first zero key.
    pub fn decode_list(raw: &[isize]) -> Result<Vec<ContextProperty>, ClError> {
        let mut properties = Vec::new();
        for pair in raw.chunks(2) {
            let key = pair[0];
            if key == 0 {
                break;
            }
            let Some(&value) = pair.get(1) else {
                return Err(ClError::Native(ErrorKind::InvalidProperty));
            };
            properties.push(Self::from_pair(key, value)?);
        }
        Ok(properties)
    }

    fn from_pair(key: isize, value: isize) -> Result<ContextProperty, ClError> {
        match key {
            CONTEXT_PLATFORM => Ok(Self::Platform(PlatformId::from_raw(value as usize))),
            CONTEXT_INTEROP_USER_SYNC => match value {
                0 => Ok(Self::InteropUserSync(false)),
                1 => Ok(Self::InteropUserSync(true)),
                _ => Err(ClError::Native(ErrorKind::InvalidProperty)),
            },
            _ => Ok(Self::Other { key, value }),
        }
    }
}
