//! Process environment overrides for tests that read `CLCONTEXT_*` variables.
//!
//! Prefer `temp_env::with_vars` under `#[serial(clcontext_env)]`. Reach for
//! [`EnvScope`] when a test needs the overrides to outlive a closure, e.g.
//! while building a [`crate::Fixture`] in several steps.
//!
//! ```rust,ignore
//! #[test]
//! #[serial(clcontext_env)]
//! fn apple_quirks_apply() {
//!     let mut scope = EnvScope::new();
//!     scope.set(DRIVER_PROFILE_ENV, "apple-2014");
//!     scope.set(OS_ENV, "darwin");
//!     let fixture = Fixture::from_env().unwrap();
//!     // ...
//! } // both variables restored here
//! ```
//!
//! Scopes share one process-wide lock, so two scopes alive in the same
//! thread deadlock. Use a single [`EnvScope`] for several variables.

use std::collections::HashMap;
use std::env;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// `CLCONTEXT_DRIVER_PROFILE`.
pub const DRIVER_PROFILE_ENV: &str = "CLCONTEXT_DRIVER_PROFILE";
/// `CLCONTEXT_MAIN_DEVICE_IDX`.
pub const MAIN_DEVICE_ENV: &str = "CLCONTEXT_MAIN_DEVICE_IDX";

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|e| e.into_inner())
}

/// Several overrides under a single lock, all restored on drop, panics included.
///
/// Must still run under `#[serial(clcontext_env)]`: the internal lock only
/// orders threads of this process.
pub struct EnvScope {
    _lock: MutexGuard<'static, ()>,
    saved: HashMap<String, Option<String>>,
}

impl EnvScope {
    pub fn new() -> Self {
        Self { _lock: env_lock(), saved: HashMap::new() }
    }

    /// Clear every variable in `keys`, e.g. all `CLCONTEXT_*` overrides, so
    /// the test starts from defaults whatever the developer's shell exports.
    pub fn cleared(keys: &[&str]) -> Self {
        let mut scope = Self::new();
        for key in keys {
            scope.remove(key);
        }
        scope
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.saved.entry(key.to_string()).or_insert_with(|| env::var(key).ok());
        // SAFETY: ENV_LOCK is held for the scope's lifetime.
        unsafe { env::set_var(key, value) };
    }

    pub fn remove(&mut self, key: &str) {
        self.saved.entry(key.to_string()).or_insert_with(|| env::var(key).ok());
        // SAFETY: ENV_LOCK is held for the scope's lifetime.
        unsafe { env::remove_var(key) };
    }
}

impl Default for EnvScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, original) in &self.saved {
            // SAFETY: the lock is still held through `_lock`.
            unsafe {
                match original {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(clcontext_env)]
    fn scope_restores_after_panic() {
        let key = "CLCONTEXT_TEST_SCOPE_PANIC";
        // SAFETY: serialised test.
        unsafe { env::set_var(key, "original") };

        let result = std::panic::catch_unwind(|| {
            let mut scope = EnvScope::new();
            scope.remove(key);
            panic!("intentional panic");
        });

        assert!(result.is_err());
        assert_eq!(env::var(key).unwrap(), "original");
        // SAFETY: serialised test.
        unsafe { env::remove_var(key) };
    }

    #[test]
    #[serial(clcontext_env)]
    fn scope_restores_every_key() {
        let a = "CLCONTEXT_TEST_SCOPE_A";
        let b = "CLCONTEXT_TEST_SCOPE_B";
        // SAFETY: serialised test.
        unsafe {
            env::set_var(a, "keep");
            env::remove_var(b);
        }
        {
            let mut scope = EnvScope::cleared(&[a]);
            assert!(env::var(a).is_err());
            scope.set(b, "1");
            scope.set(b, "2");
            assert_eq!(env::var(b).unwrap(), "2");
        }
        assert_eq!(env::var(a).unwrap(), "keep");
        assert!(env::var(b).is_err());
        // SAFETY: serialised test.
        unsafe { env::remove_var(a) };
    }
}
