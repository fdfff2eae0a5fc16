//! Error types surfaced by the registry and by every native call.

use crate::registry::{ErrorKind, Status};

/// Convenience alias for results carrying a translated native failure.
pub type Result<T, E = ClError> = std::result::Result<T, E>;

/// A native call failure, translated through the registry.
///
/// The `Display` text of [`ClError::Native`] is exactly the kind's
/// [`message`](ErrorKind::message), so callers may compare failures by
/// message string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ClError {
    #[error("{}", .0.message())]
    Native(ErrorKind),

    /// The runtime returned a status outside the documented failure range.
    #[error("unknown OpenCL status code {0}")]
    UnknownStatus(Status),
}

impl ClError {
    /// The registry kind, if the status was a documented one.
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Native(kind) => Some(*kind),
            Self::UnknownStatus(_) => None,
        }
    }

    /// The raw native status this failure was built from.
    pub const fn status(&self) -> Status {
        match self {
            Self::Native(kind) => kind.code(),
            Self::UnknownStatus(code) => *code,
        }
    }

    /// Whether this failure is the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }
}

impl From<ErrorKind> for ClError {
    fn from(kind: ErrorKind) -> Self {
        Self::Native(kind)
    }
}

/// Lookup failures of the registry itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("status code {0} is outside the documented OpenCL failure range")]
    UnknownCode(Status),

    #[error("no OpenCL status is named '{0}'")]
    UnknownName(String),
}
