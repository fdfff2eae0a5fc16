//! Quirk matrices as data.
//!
//! A [`RuleSet`] is an ordered list of [`ExclusionRule`]s, usually loaded from
//! TOML:
//!
//! ```toml
//! [[rule]]
//! os = "darwin"
//! driver = "OpenCL 1.2 (Dec 14 2014 22:29:47)"
//! operation = "create_context_from_type.zero_mask"
//! action = "substitute"
//! expect = "INVALID_DEVICE"
//! reason = "returns INVALID_DEVICE for a zero device-type mask"
//! ```

use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::environment::Environment;
use crate::rule::{Action, ExclusionRule};

/// Operation tags used by the shipped matrix.
pub mod operations {
    /// `create_context` with absent devices.
    pub const CREATE_CONTEXT_NULL_DEVICES: &str = "create_context.null_devices";
    /// `create_context_from_type` with a zero device-type mask.
    pub const CREATE_FROM_TYPE_ZERO_MASK: &str = "create_context_from_type.zero_mask";
}

const APPLE_2014_DRIVER: &str = "OpenCL 1.2 (Dec 14 2014 22:29:47)";
const AMD_APP_1642_DRIVER: &str = "OpenCL 2.0 AMD-APP (1642.5)";

static KNOWN_QUIRKS: LazyLock<RuleSet> = LazyLock::new(build_known_quirks);

fn build_known_quirks() -> RuleSet {
    RuleSet {
        rules: vec![
            ExclusionRule {
                os: Some("darwin".into()),
                driver: Some(APPLE_2014_DRIVER.into()),
                operation: Some(operations::CREATE_CONTEXT_NULL_DEVICES.into()),
                ..ExclusionRule::new("It returns INVALID_DEVICE instead of invalid value")
            },
            ExclusionRule {
                os: Some("darwin".into()),
                driver: Some(APPLE_2014_DRIVER.into()),
                action: Action::Substitute,
                operation: Some(operations::CREATE_FROM_TYPE_ZERO_MASK.into()),
                expect: Some("INVALID_DEVICE".into()),
                ..ExclusionRule::new("It returns INVALID_DEVICE instead of invalid value")
            },
            ExclusionRule {
                os: Some("linux".into()),
                driver: Some(AMD_APP_1642_DRIVER.into()),
                action: Action::Substitute,
                operation: Some(operations::CREATE_FROM_TYPE_ZERO_MASK.into()),
                expect: Some("DEVICE_NOT_FOUND".into()),
                ..ExclusionRule::new("It returns DEVICE_NOT_FOUND instead of invalid value")
            },
        ],
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    #[error("failed to read rule file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse rule TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize rules: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("rule {index}: {reason}")]
    Validation { index: usize, reason: String },
}

/// Ordered exclusion rules; the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(rename = "rule", default)]
    rules: Vec<ExclusionRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    /// The driver anomalies the context suite is known to hit.
    pub fn known_quirks() -> &'static RuleSet {
        LazyLock::force(&KNOWN_QUIRKS)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, RuleSetError> {
        let set: RuleSet = toml::from_str(toml_str)?;
        set.validate()?;
        debug!(rules = set.rules.len(), "rule set parsed");
        Ok(set)
    }

    pub fn load(path: &Path) -> Result<Self, RuleSetError> {
        let contents = std::fs::read_to_string(path)?;
        let set = Self::from_toml(&contents)?;
        info!(path = %path.display(), rules = set.len(), "rule set loaded");
        Ok(set)
    }

    pub fn to_toml(&self) -> Result<String, RuleSetError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), RuleSetError> {
        for (index, rule) in self.rules.iter().enumerate() {
            let fail = |reason: &str| RuleSetError::Validation { index, reason: reason.to_owned() };
            if rule.reason.trim().is_empty() {
                return Err(fail("reason must not be empty"));
            }
            if rule.action == Action::Substitute && rule.expect.is_none() {
                return Err(fail("substitute rules must name the expected error"));
            }
            if let Some(expect) = &rule.expect {
                let well_formed = !expect.is_empty()
                    && expect
                        .chars()
                        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
                if !well_formed {
                    return Err(fail(
                        "expect must be an upper-case error name such as INVALID_DEVICE",
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Append `other`'s rules after this set's.
    pub fn extend(&mut self, other: RuleSet) {
        self.rules.extend(other.rules);
    }

    /// Rules matching `environment`, in order, whatever their operation.
    pub fn matching<'a>(
        &'a self,
        environment: &'a Environment,
    ) -> impl Iterator<Item = &'a ExclusionRule> {
        self.rules.iter().filter(move |rule| rule.matches(environment))
    }

    /// First rule for `operation` that matches `environment`.
    pub fn first_match(
        &self,
        environment: &Environment,
        operation: &str,
    ) -> Option<&ExclusionRule> {
        self.rules.iter().find(|rule| rule.applies_to(operation) && rule.matches(environment))
    }

    /// The error name `operation` should fail with here: the first matching
    /// rule's `expect`, else `default`.
    pub fn expected_error<'a>(
        &'a self,
        environment: &Environment,
        operation: &str,
        default: &'a str,
    ) -> &'a str {
        self.first_match(environment, operation)
            .and_then(|rule| rule.expect.as_deref())
            .unwrap_or(default)
    }
}
