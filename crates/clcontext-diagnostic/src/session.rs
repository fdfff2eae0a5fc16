//! Fluent, per-test exclusion chains.
//!
//! ```
//! use clcontext_diagnostic::{Diagnostic, Environment};
//!
//! let diag = Diagnostic::new(Environment::new("darwin", "OpenCL 1.2 (Dec 14 2014 22:29:47)"));
//! let verdict = diag
//!     .exclude(None, None)
//!     .os("darwin")
//!     .driver("OpenCL 1.2 (Dec 14 2014 22:29:47)")
//!     .because("returns INVALID_DEVICE instead of INVALID_VALUE")
//!     .raise();
//! assert!(verdict.is_excluded());
//! ```

use std::cell::Cell;
use std::fmt;

use tracing::{debug, info};

use crate::environment::{Environment, Identity};
use crate::rule::{Action, ExclusionRule};

/// Outcome of a terminal `raise`.
#[must_use = "an excluded test must stop before its default assertions"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No rule fired here; the default assertions must hold.
    Proceed,
    /// The rest of the test is waived.
    Excluded { reason: String },
    /// The rule's alternate block ran as the test's assertion.
    Substituted { reason: String },
}

impl Verdict {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Excluded { .. })
    }

    pub fn is_substituted(&self) -> bool {
        matches!(self, Self::Substituted { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Proceed => None,
            Self::Excluded { reason } | Self::Substituted { reason } => Some(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proceed => f.write_str("proceed"),
            Self::Excluded { reason } => write!(f, "excluded: {reason}"),
            Self::Substituted { reason } => write!(f, "substituted: {reason}"),
        }
    }
}

/// One test's exclusion session.
///
/// Rules are evaluated in the order their `raise` is called. Once one has
/// fired, later rules in the same session neither match nor run.
#[derive(Debug)]
pub struct Diagnostic {
    environment: Environment,
    fired: Cell<bool>,
}

impl Diagnostic {
    pub fn new(environment: Environment) -> Self {
        Self { environment, fired: Cell::new(false) }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Whether a rule has fired in this session.
    pub fn fired(&self) -> bool {
        self.fired.get()
    }

    /// Begin a rule for the given platform and device; `None` matches any.
    pub fn exclude(
        &self,
        platform: Option<Identity>,
        device: Option<Identity>,
    ) -> ExclusionBuilder<'_> {
        let mut rule = ExclusionRule::new(String::new());
        rule.platform = platform;
        rule.device = device;
        ExclusionBuilder { diagnostic: self, rule }
    }

    /// Run `block` unless a rule already fired; the default assertion path.
    pub fn otherwise<R>(&self, block: impl FnOnce() -> R) -> Option<R> {
        if self.fired() {
            return None;
        }
        Some(block())
    }

    /// Evaluate a prepared skip rule, such as one loaded from a [`crate::RuleSet`].
    pub fn raise_rule(&self, rule: &ExclusionRule) -> Verdict {
        if self.fire(rule) {
            Verdict::Excluded { reason: rule.reason.clone() }
        } else {
            Verdict::Proceed
        }
    }

    fn fire(&self, rule: &ExclusionRule) -> bool {
        if self.fired() {
            debug!(reason = %rule.reason, "skipping rule, an earlier one fired");
            return false;
        }
        if !rule.matches(&self.environment) {
            return false;
        }
        self.fired.set(true);
        info!(
            reason = %rule.reason,
            action = ?rule.action,
            environment = %self.environment,
            "exclusion rule matched"
        );
        true
    }
}

/// A rule under construction; [`because`](Self::because) completes it.
#[derive(Debug)]
pub struct ExclusionBuilder<'d> {
    diagnostic: &'d Diagnostic,
    rule: ExclusionRule,
}

impl<'d> ExclusionBuilder<'d> {
    /// Narrow to one OS. Case-insensitive; `macos` and `darwin` are the same.
    pub fn os(mut self, name: impl Into<String>) -> Self {
        self.rule.os = Some(name.into());
        self
    }

    /// Narrow to drivers whose version string contains `substring`.
    pub fn driver(mut self, substring: impl Into<String>) -> Self {
        self.rule.driver = Some(substring.into());
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Exclusion<'d> {
        self.rule.reason = reason.into();
        Exclusion { diagnostic: self.diagnostic, rule: self.rule }
    }
}

/// A justified rule, ready to act.
#[derive(Debug)]
pub struct Exclusion<'d> {
    diagnostic: &'d Diagnostic,
    rule: ExclusionRule,
}

impl<'d> Exclusion<'d> {
    pub fn rule(&self) -> &ExclusionRule {
        &self.rule
    }

    /// On match the remainder of the test is waived.
    pub fn raise(self) -> Verdict {
        self.diagnostic.raise_rule(&self.rule)
    }

    /// Attach the assertion to run instead of the default one on match.
    pub fn should<F: FnOnce()>(mut self, block: F) -> GuardedExclusion<'d, F> {
        self.rule.action = Action::Substitute;
        GuardedExclusion { diagnostic: self.diagnostic, rule: self.rule, block }
    }
}

/// A rule carrying an alternate assertion block.
pub struct GuardedExclusion<'d, F> {
    diagnostic: &'d Diagnostic,
    rule: ExclusionRule,
    block: F,
}

impl<F> fmt::Debug for GuardedExclusion<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedExclusion").field("rule", &self.rule).finish_non_exhaustive()
    }
}

impl<F: FnOnce()> GuardedExclusion<'_, F> {
    /// On match run the block; a failing block fails the test.
    pub fn raise(self) -> Verdict {
        if !self.diagnostic.fire(&self.rule) {
            return Verdict::Proceed;
        }
        (self.block)();
        Verdict::Substituted { reason: self.rule.reason }
    }
}
