//! Shared test helpers for suites built on `clcontext-core`.
//!
//! - [`Fixture`]: runtime, platform, devices and main device resolved from
//!   [`clcontext_core::RuntimeConfig`], plus the matching diagnostic
//!   [`Environment`](clcontext_diagnostic::Environment)
//! - [`EnvScope`]: scoped `CLCONTEXT_*` overrides
//! - [`assert_fails_with`]: exact-message failure assertions

use std::fmt::Debug;

use clcontext_status::{ClError, ErrorKind};

pub mod env_guard;
pub mod fixture;

pub use clcontext_diagnostic::{DRIVER_ENV, OS_ENV};
pub use env_guard::{DRIVER_PROFILE_ENV, EnvScope, MAIN_DEVICE_ENV};
pub use fixture::{Fixture, FixtureError};

/// Every variable the fixture and configuration read.
pub const CLCONTEXT_ENV_KEYS: [&str; 7] = [
    "CLCONTEXT_BACKEND",
    DRIVER_PROFILE_ENV,
    "CLCONTEXT_PLATFORM_IDX",
    MAIN_DEVICE_ENV,
    "CLCONTEXT_SIM_DEVICES",
    OS_ENV,
    DRIVER_ENV,
];

/// Assert `result` failed, and that its message is exactly `kind`'s.
#[track_caller]
pub fn assert_fails_with<T: Debug>(result: Result<T, ClError>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("expected failure `{}`, got Ok({value:?})", kind.message()),
        Err(err) => assert_eq!(
            err.to_string(),
            kind.message(),
            "expected {} but the call failed with {err:?}",
            kind.name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_message_passes() {
        let result: Result<(), ClError> = Err(ClError::Native(ErrorKind::InvalidValue));
        assert_fails_with(result, ErrorKind::InvalidValue);
    }

    #[test]
    #[should_panic(expected = "expected INVALID_DEVICE")]
    fn different_kind_fails() {
        let result: Result<(), ClError> = Err(ClError::Native(ErrorKind::InvalidValue));
        assert_fails_with(result, ErrorKind::InvalidDevice);
    }

    #[test]
    #[should_panic(expected = "got Ok(7)")]
    fn success_fails() {
        assert_fails_with(Ok::<_, ClError>(7), ErrorKind::InvalidValue);
    }
}
