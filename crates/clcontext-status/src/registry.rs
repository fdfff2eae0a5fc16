//! The status table and its lookups.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{ClError, RegistryError};

/// Raw native status as returned by the OpenCL runtime (`cl_int`).
pub type Status = i32;

/// `CL_SUCCESS`.
pub const SUCCESS: Status = 0;

macro_rules! status_table {
    ($( $variant:ident = $code:literal, $name:literal, $message:literal; )+) => {
        /// A documented OpenCL failure status.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum ErrorKind {
            $( $variant, )+
        }

        impl ErrorKind {
            /// Every kind, ordered from `-1` downwards.
            pub const ALL: &'static [ErrorKind] = &[ $( ErrorKind::$variant, )+ ];

            /// Numeric native code.
            pub const fn code(self) -> Status {
                match self { $( ErrorKind::$variant => $code, )+ }
            }

            /// Stable symbolic name, without the `CL_` prefix.
            pub const fn name(self) -> &'static str {
                match self { $( ErrorKind::$variant => $name, )+ }
            }

            /// Human-readable message used when this failure is signalled.
            pub const fn message(self) -> &'static str {
                match self { $( ErrorKind::$variant => $message, )+ }
            }

            const fn from_code(code: Status) -> Option<ErrorKind> {
                match code {
                    $( $code => Some(ErrorKind::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

status_table! {
    DeviceNotFound = -1, "DEVICE_NOT_FOUND", "Device not found";
    DeviceNotAvailable = -2, "DEVICE_NOT_AVAILABLE", "Device not available";
    CompilerNotAvailable = -3, "COMPILER_NOT_AVAILABLE", "Compiler not available";
    MemObjectAllocationFailure = -4, "MEM_OBJECT_ALLOCATION_FAILURE",
        "Memory object allocation failure";
    OutOfResources = -5, "OUT_OF_RESOURCES", "Out of resources";
    OutOfHostMemory = -6, "OUT_OF_HOST_MEMORY", "Out of host memory";
    ProfilingInfoNotAvailable = -7, "PROFILING_INFO_NOT_AVAILABLE",
        "Profiling information not available";
    MemCopyOverlap = -8, "MEM_COPY_OVERLAP", "Memory copy overlap";
    ImageFormatMismatch = -9, "IMAGE_FORMAT_MISMATCH", "Image format mismatch";
    ImageFormatNotSupported = -10, "IMAGE_FORMAT_NOT_SUPPORTED", "Image format not supported";
    BuildProgramFailure = -11, "BUILD_PROGRAM_FAILURE", "Program build failure";
    MapFailure = -12, "MAP_FAILURE", "Map failure";
    MisalignedSubBufferOffset = -13, "MISALIGNED_SUB_BUFFER_OFFSET", "Misaligned sub-buffer offset";
    ExecStatusErrorForEventsInWaitList = -14, "EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST",
        "Execution status error for events in wait list";
    CompileProgramFailure = -15, "COMPILE_PROGRAM_FAILURE", "Program compile failure";
    LinkerNotAvailable = -16, "LINKER_NOT_AVAILABLE", "Linker not available";
    LinkProgramFailure = -17, "LINK_PROGRAM_FAILURE", "Program link failure";
    DevicePartitionFailed = -18, "DEVICE_PARTITION_FAILED", "Device partition failed";
    KernelArgInfoNotAvailable = -19, "KERNEL_ARG_INFO_NOT_AVAILABLE",
        "Kernel argument info not available";
    InvalidValue = -30, "INVALID_VALUE", "Invalid value";
    InvalidDeviceType = -31, "INVALID_DEVICE_TYPE", "Invalid device type";
    InvalidPlatform = -32, "INVALID_PLATFORM", "Invalid platform";
    InvalidDevice = -33, "INVALID_DEVICE", "Invalid device";
    InvalidContext = -34, "INVALID_CONTEXT", "Invalid context";
    InvalidQueueProperties = -35, "INVALID_QUEUE_PROPERTIES", "Invalid queue properties";
    InvalidCommandQueue = -36, "INVALID_COMMAND_QUEUE", "Invalid command queue";
    InvalidHostPtr = -37, "INVALID_HOST_PTR", "Invalid host pointer";
    InvalidMemObject = -38, "INVALID_MEM_OBJECT", "Invalid memory object";
    InvalidImageFormatDescriptor = -39, "INVALID_IMAGE_FORMAT_DESCRIPTOR",
        "Invalid image format descriptor";
    InvalidImageSize = -40, "INVALID_IMAGE_SIZE", "Invalid image size";
    InvalidSampler = -41, "INVALID_SAMPLER", "Invalid sampler";
    InvalidBinary = -42, "INVALID_BINARY", "Invalid binary";
    InvalidBuildOptions = -43, "INVALID_BUILD_OPTIONS", "Invalid build options";
    InvalidProgram = -44, "INVALID_PROGRAM", "Invalid program";
    InvalidProgramExecutable = -45, "INVALID_PROGRAM_EXECUTABLE", "Invalid program executable";
    InvalidKernelName = -46, "INVALID_KERNEL_NAME", "Invalid kernel name";
    InvalidKernelDefinition = -47, "INVALID_KERNEL_DEFINITION", "Invalid kernel definition";
    InvalidKernel = -48, "INVALID_KERNEL", "Invalid kernel";
    InvalidArgIndex = -49, "INVALID_ARG_INDEX", "Invalid argument index";
    InvalidArgValue = -50, "INVALID_ARG_VALUE", "Invalid argument value";
    InvalidArgSize = -51, "INVALID_ARG_SIZE", "Invalid argument size";
    InvalidKernelArgs = -52, "INVALID_KERNEL_ARGS", "Invalid kernel arguments";
    InvalidWorkDimension = -53, "INVALID_WORK_DIMENSION", "Invalid work dimension";
    InvalidWorkGroupSize = -54, "INVALID_WORK_GROUP_SIZE", "Invalid work group size";
    InvalidWorkItemSize = -55, "INVALID_WORK_ITEM_SIZE", "Invalid work item size";
    InvalidGlobalOffset = -56, "INVALID_GLOBAL_OFFSET", "Invalid global offset";
    InvalidEventWaitList = -57, "INVALID_EVENT_WAIT_LIST", "Invalid event wait list";
    InvalidEvent = -58, "INVALID_EVENT", "Invalid event";
    InvalidOperation = -59, "INVALID_OPERATION", "Invalid operation";
    InvalidGlObject = -60, "INVALID_GL_OBJECT", "Invalid GL object";
    InvalidBufferSize = -61, "INVALID_BUFFER_SIZE", "Invalid buffer size";
    InvalidMipLevel = -62, "INVALID_MIP_LEVEL", "Invalid mip level";
    InvalidGlobalWorkSize = -63, "INVALID_GLOBAL_WORK_SIZE", "Invalid global work size";
    InvalidProperty = -64, "INVALID_PROPERTY", "Invalid property";
    InvalidImageDescriptor = -65, "INVALID_IMAGE_DESCRIPTOR", "Invalid image descriptor";
    InvalidCompilerOptions = -66, "INVALID_COMPILER_OPTIONS", "Invalid compiler options";
    InvalidLinkerOptions = -67, "INVALID_LINKER_OPTIONS", "Invalid linker options";
    InvalidDevicePartitionCount = -68, "INVALID_DEVICE_PARTITION_COUNT",
        "Invalid device partition count";
    InvalidPipeSize = -69, "INVALID_PIPE_SIZE", "Invalid pipe size";
    InvalidDeviceQueue = -70, "INVALID_DEVICE_QUEUE", "Invalid device queue";
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorKind {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        kind_for(s)
    }
}

impl TryFrom<String> for ErrorKind {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        kind_for(&value)
    }
}

impl From<ErrorKind> for String {
    fn from(kind: ErrorKind) -> Self {
        kind.name().to_string()
    }
}

impl TryFrom<Status> for ErrorKind {
    type Error = RegistryError;

    fn try_from(code: Status) -> Result<Self, Self::Error> {
        lookup(code)
    }
}

static NAME_INDEX: OnceLock<HashMap<&'static str, ErrorKind>> = OnceLock::new();

fn name_index() -> &'static HashMap<&'static str, ErrorKind> {
    NAME_INDEX.get_or_init(|| ErrorKind::ALL.iter().map(|kind| (kind.name(), *kind)).collect())
}

/// Map a native status code to its kind.
///
/// Fails for `0` (success) and for codes outside the documented failure
/// range.
pub fn lookup(code: Status) -> Result<ErrorKind, RegistryError> {
    ErrorKind::from_code(code).ok_or(RegistryError::UnknownCode(code))
}

/// Resolve a kind by its symbolic name.
///
/// Accepts both `"INVALID_VALUE"` and `"CL_INVALID_VALUE"`.
pub fn kind_for(name: &str) -> Result<ErrorKind, RegistryError> {
    let bare = name.strip_prefix("CL_").unwrap_or(name);
    name_index().get(bare).copied().ok_or_else(|| RegistryError::UnknownName(name.to_string()))
}

/// Translate a native status into a typed result.
pub fn check(status: Status) -> Result<(), ClError> {
    if status == SUCCESS {
        return Ok(());
    }
    match ErrorKind::from_code(status) {
        Some(kind) => Err(ClError::Native(kind)),
        None => Err(ClError::UnknownStatus(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<_> = ErrorKind::ALL.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn names_are_unique() {
        assert_eq!(name_index().len(), ErrorKind::ALL.len());
    }

    #[test]
    fn gap_between_runtime_and_api_errors_is_unknown() {
        for code in -29..=-20 {
            assert_eq!(lookup(code), Err(RegistryError::UnknownCode(code)));
        }
    }

    #[test]
    fn prefixed_name_resolves() {
        assert_eq!(kind_for("CL_DEVICE_NOT_FOUND"), Ok(ErrorKind::DeviceNotFound));
    }

    #[test]
    fn lowercase_name_is_rejected() {
        assert!(kind_for("invalid_value").is_err());
    }
}
