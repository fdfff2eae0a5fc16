//! Context introspection keys and their typed results.
//!
//! The native runtime answers every query with raw bytes. The shape of those
//! bytes is fixed by the key, so decoding is a total mapping from
//! [`ContextInfoParam`] to a [`ContextInfo`] variant.

use std::mem::size_of;

use clcontext_status::{ClError, ErrorKind};
use tracing::debug;

use crate::types::{ContextProperty, DeviceId};

/// Queryable context attributes (`cl_context_info`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ContextInfoParam {
    ReferenceCount = 0x1080,
    Devices = 0x1081,
    Properties = 0x1082,
    NumDevices = 0x1083,
}

impl ContextInfoParam {
    pub const ALL: [ContextInfoParam; 4] =
        [Self::ReferenceCount, Self::Devices, Self::Properties, Self::NumDevices];

    /// The native key value.
    pub const fn key(self) -> u32 {
        self as u32
    }

    /// Resolve a caller-supplied key; `None` for anything outside the enumeration.
    pub fn from_key(key: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|param| i64::from(param.key()) == key)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ReferenceCount => "CONTEXT_REFERENCE_COUNT",
            Self::Devices => "CONTEXT_DEVICES",
            Self::Properties => "CONTEXT_PROPERTIES",
            Self::NumDevices => "CONTEXT_NUM_DEVICES",
        }
    }
}

impl std::fmt::Display for ContextInfoParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded context attribute. The variant always matches the queried key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextInfo {
    ReferenceCount(u32),
    Devices(Vec<DeviceId>),
    Properties(Vec<ContextProperty>),
    NumDevices(u32),
}

impl ContextInfo {
    /// The key this value answers.
    pub const fn param(&self) -> ContextInfoParam {
        match self {
            Self::ReferenceCount(_) => ContextInfoParam::ReferenceCount,
            Self::Devices(_) => ContextInfoParam::Devices,
            Self::Properties(_) => ContextInfoParam::Properties,
            Self::NumDevices(_) => ContextInfoParam::NumDevices,
        }
    }

    pub const fn as_reference_count(&self) -> Option<u32> {
        match self {
            Self::ReferenceCount(count) => Some(*count),
            _ => None,
        }
    }

    pub fn as_devices(&self) -> Option<&[DeviceId]> {
        match self {
            Self::Devices(devices) => Some(devices),
            _ => None,
        }
    }

    pub fn as_properties(&self) -> Option<&[ContextProperty]> {
        match self {
            Self::Properties(properties) => Some(properties),
            _ => None,
        }
    }

    pub const fn as_num_devices(&self) -> Option<u32> {
        match self {
            Self::NumDevices(count) => Some(*count),
            _ => None,
        }
    }

    /// Decode the native answer for `param`.
    ///
    /// A byte count that does not fit the key's shape is reported as
    /// `InvalidValue`.
    pub fn decode(param: ContextInfoParam, bytes: &[u8]) -> Result<Self, ClError> {
        match param {
            ContextInfoParam::ReferenceCount => decode_u32(param, bytes).map(Self::ReferenceCount),
            ContextInfoParam::NumDevices => decode_u32(param, bytes).map(Self::NumDevices),
            ContextInfoParam::Devices => {
                let raw = decode_words(param, bytes)?;
                Ok(Self::Devices(raw.into_iter().map(DeviceId::from_raw).collect()))
            }
            ContextInfoParam::Properties => {
                let raw: Vec<isize> =
                    decode_words(param, bytes)?.into_iter().map(|w| w as isize).collect();
                ContextProperty::decode_list(&raw).map(Self::Properties)
            }
        }
    }

    /// Native byte encoding, as a runtime would answer the query.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::ReferenceCount(count) | Self::NumDevices(count) => count.to_ne_bytes().to_vec(),
            Self::Devices(devices) => devices.iter().flat_map(|d| d.raw().to_ne_bytes()).collect(),
            Self::Properties(properties) if properties.is_empty() => Vec::new(),
            Self::Properties(properties) => ContextProperty::encode_list(properties)
                .into_iter()
                .flat_map(isize::to_ne_bytes)
                .collect(),
        }
    }
}

fn decode_u32(param: ContextInfoParam, bytes: &[u8]) -> Result<u32, ClError> {
    let array: [u8; 4] = bytes.try_into().map_err(|_| malformed(param, bytes.len()))?;
    Ok(u32::from_ne_bytes(array))
}

fn decode_words(param: ContextInfoParam, bytes: &[u8]) -> Result<Vec<usize>, ClError> {
    const WORD: usize = size_of::<usize>();
    if bytes.len() % WORD != 0 {
        return Err(malformed(param, bytes.len()));
    }
    Ok(bytes
        .chunks_exact(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word.copy_from_slice(chunk);
            usize::from_ne_bytes(word)
        })
        .collect())
}

fn malformed(param: ContextInfoParam, len: usize) -> ClError {
    debug!(%param, len, "native answer does not match the key's shape");
    ClError::Native(ErrorKind::InvalidValue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlatformId;

    #[test]
    fn from_key_rejects_negative_and_unknown() {
        assert_eq!(ContextInfoParam::from_key(-1), None);
        assert_eq!(ContextInfoParam::from_key(0x1084), None);
        assert_eq!(ContextInfoParam::from_key(0x1080), Some(ContextInfoParam::ReferenceCount));
    }

    #[test]
    fn reference_count_decodes_from_four_bytes() {
        let info = ContextInfo::decode(ContextInfoParam::ReferenceCount, &3u32.to_ne_bytes());
        assert_eq!(info, Ok(ContextInfo::ReferenceCount(3)));
    }

    #[test]
    fn reference_count_with_wrong_width_is_invalid_value() {
        let err = ContextInfo::decode(ContextInfoParam::ReferenceCount, &[1, 0]).unwrap_err();
        assert!(err.is(ErrorKind::InvalidValue));
    }

    #[test]
    fn devices_encode_decode_preserves_order() {
        let info = ContextInfo::Devices(vec![DeviceId::from_raw(7), DeviceId::from_raw(3)]);
        let decoded = ContextInfo::decode(ContextInfoParam::Devices, &info.encode()).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn empty_properties_encode_to_zero_bytes() {
        let info = ContextInfo::Properties(Vec::new());
        assert!(info.encode().is_empty());
        let decoded = ContextInfo::decode(ContextInfoParam::Properties, &[]).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn platform_property_survives_encoding() {
        let info =
            ContextInfo::Properties(vec![ContextProperty::Platform(PlatformId::from_raw(0x1000))]);
        let decoded = ContextInfo::decode(ContextInfoParam::Properties, &info.encode()).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn param_matches_variant() {
        assert_eq!(ContextInfo::NumDevices(2).param(), ContextInfoParam::NumDevices);
        assert_eq!(ContextInfo::ReferenceCount(1).as_devices(), None);
    }
}
