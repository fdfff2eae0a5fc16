//! Native status code registry for the clcontext workspace.
//!
//! Every OpenCL failure status maps to exactly one [`ErrorKind`], which
//! carries the numeric code, a stable symbolic name (`"INVALID_VALUE"`), and
//! the human-readable message used when the failure is signalled. Tests
//! compare failures by that message, so message text is part of the public
//! contract and must never change.
//!
//! ```
//! use clcontext_status::{ClError, ErrorKind, check, kind_for, lookup};
//!
//! assert_eq!(lookup(-30).unwrap(), ErrorKind::InvalidValue);
//! assert_eq!(kind_for("INVALID_DEVICE_TYPE").unwrap().code(), -31);
//! assert_eq!(check(-33), Err(ClError::Native(ErrorKind::InvalidDevice)));
//! assert!(check(0).is_ok());
//! ```

mod error;
mod registry;

pub use error::{ClError, RegistryError, Result};
pub use registry::{ErrorKind, SUCCESS, Status, check, kind_for, lookup};
