//! Declarative exclusion records.

use serde::{Deserialize, Serialize};

use crate::environment::{Environment, Identity, normalize_os};

/// What a matching rule does to the enclosing test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Waive the rest of the test.
    #[default]
    Skip,
    /// Run an alternate assertion in place of the default one.
    Substitute,
}

/// One known anomaly: where it happens, why, and what to do about it.
///
/// Every `None` predicate matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Substring of the driver string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub action: Action,
    /// Operation the rule applies to, e.g. `create_context_from_type.zero_mask`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Name of the error expected instead of the default, e.g. `INVALID_DEVICE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,
}

impl ExclusionRule {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            platform: None,
            device: None,
            os: None,
            driver: None,
            reason: reason.into(),
            action: Action::Skip,
            operation: None,
            expect: None,
        }
    }

    /// Whether every predicate holds for `environment`.
    pub fn matches(&self, environment: &Environment) -> bool {
        identity_matches(self.platform, environment.platform)
            && identity_matches(self.device, environment.device)
            && self.os.as_deref().is_none_or(|os| normalize_os(os) == environment.os)
            && self.driver.as_deref().is_none_or(|driver| environment.driver.contains(driver))
    }

    /// Whether the rule is tagged for `operation`; untagged rules apply everywhere.
    pub fn applies_to(&self, operation: &str) -> bool {
        self.operation.as_deref().is_none_or(|op| op == operation)
    }
}

fn identity_matches(wanted: Option<Identity>, actual: Option<Identity>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual == Some(wanted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple_rule() -> ExclusionRule {
        ExclusionRule {
            os: Some("darwin".into()),
            driver: Some("OpenCL 1.2 (Dec 14 2014 22:29:47)".into()),
            ..ExclusionRule::new("returns INVALID_DEVICE")
        }
    }

    #[test]
    fn empty_rule_matches_everything() {
        assert!(ExclusionRule::new("any").matches(&Environment::new("linux", "")));
    }

    #[test]
    fn os_and_driver_must_both_match() {
        let rule = apple_rule();
        assert!(rule.matches(&Environment::new("macos", "OpenCL 1.2 (Dec 14 2014 22:29:47)")));
        assert!(!rule.matches(&Environment::new("linux", "OpenCL 1.2 (Dec 14 2014 22:29:47)")));
        assert!(!rule.matches(&Environment::new("darwin", "OpenCL 1.2 (Apr 1 2016)")));
    }

    #[test]
    fn driver_is_a_substring_match() {
        let rule = ExclusionRule { driver: Some("AMD-APP".into()), ..ExclusionRule::new("amd") };
        assert!(rule.matches(&Environment::new("linux", "OpenCL 2.0 AMD-APP (1642.5)")));
    }

    #[test]
    fn identity_predicate_needs_a_known_identity() {
        let rule = ExclusionRule { platform: Some(Identity::new(7)), ..ExclusionRule::new("p7") };
        assert!(!rule.matches(&Environment::new("linux", "")));
        assert!(rule.matches(&Environment::new("linux", "").with_platform(7)));
        assert!(!rule.matches(&Environment::new("linux", "").with_platform(8)));
    }

    #[test]
    fn untagged_rules_apply_to_every_operation() {
        assert!(ExclusionRule::new("x").applies_to("anything"));
        let tagged = ExclusionRule { operation: Some("a".into()), ..ExclusionRule::new("x") };
        assert!(tagged.applies_to("a"));
        assert!(!tagged.applies_to("b"));
    }
}
