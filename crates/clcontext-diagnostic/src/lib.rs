//! Platform/driver exclusion rules for suites that must pass on buggy drivers.
//!
//! A test opens a [`Diagnostic`] session over the running [`Environment`] and
//! declares, in order, the anomalies it knows about. The first rule whose
//! platform, device, OS and driver predicates all hold decides the test's
//! fate: it is waived ([`Exclusion::raise`]) or its alternate assertion runs
//! ([`Exclusion::should`]). When nothing fires the default assertions run
//! unmodified via [`Diagnostic::otherwise`].
//!
//! The same records can be kept as data in a [`RuleSet`], loaded from TOML.
//!
//! This crate knows nothing about contexts or error codes; expected errors are
//! carried by name.

pub mod environment;
pub mod rule;
pub mod ruleset;
pub mod session;

pub use environment::{
    DRIVER_ENV, Environment, EnvironmentOverrides, Identity, OS_ENV, normalize_os,
};
pub use rule::{Action, ExclusionRule};
pub use ruleset::{RuleSet, RuleSetError, operations};
pub use session::{Diagnostic, Exclusion, ExclusionBuilder, GuardedExclusion, Verdict};
