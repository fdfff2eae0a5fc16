//! Which exclusion rules fire in the current environment

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use clcontext_diagnostic::{Action, Environment, ExclusionRule, RuleSet};
use console::style;
use serde::Serialize;

use super::Session;
use crate::output::{OutputFormat, emit};

/// Evaluate a quirk rule set against the configured platform
#[derive(Debug, Args)]
pub struct QuirksCommand {
    /// Rule file (TOML, `[[rule]]` tables); defaults to the built-in matrix
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Only consider rules for this operation tag
    #[arg(long, value_name = "OP")]
    pub operation: Option<String>,

    /// Print the selected rule set as TOML and exit
    #[arg(long)]
    pub dump: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleReport {
    pub index: usize,
    pub matches: bool,
    /// Whether this rule is the one that takes effect for its operation.
    pub effective: bool,
    #[serde(flatten)]
    pub rule: ExclusionRule,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuirksReport {
    pub source: String,
    pub environment: Environment,
    pub rules: Vec<RuleReport>,
}

impl QuirksCommand {
    fn rule_set(&self) -> Result<(String, RuleSet)> {
        match &self.file {
            Some(path) => {
                let set = RuleSet::load(path)
                    .with_context(|| format!("failed to load rules from {}", path.display()))?;
                Ok((path.display().to_string(), set))
            }
            None => Ok(("built-in".to_string(), RuleSet::known_quirks().clone())),
        }
    }

    /// Evaluate `rules` against `environment`.
    pub fn evaluate(
        &self,
        source: String,
        rules: &RuleSet,
        environment: Environment,
    ) -> QuirksReport {
        let mut taken: Vec<Option<&str>> = Vec::new();
        let reports = rules
            .rules()
            .iter()
            .enumerate()
            .filter(|(_, rule)| self.operation.as_deref().is_none_or(|op| rule.applies_to(op)))
            .map(|(index, rule)| {
                let matches = rule.matches(&environment);
                // First match per operation tag wins.
                let effective = matches && !taken.contains(&rule.operation.as_deref());
                if effective {
                    taken.push(rule.operation.as_deref());
                }
                RuleReport { index, matches, effective, rule: rule.clone() }
            })
            .collect();
        QuirksReport { source, environment, rules: reports }
    }

    pub fn report(&self, session: &Session) -> Result<QuirksReport> {
        let (source, rules) = self.rule_set()?;
        Ok(self.evaluate(source, &rules, session.environment()?))
    }

    pub fn run(&self, session: &Session, format: OutputFormat) -> Result<()> {
        if self.dump {
            let (_, rules) = self.rule_set()?;
            print!("{}", rules.to_toml()?);
            return Ok(());
        }
        let report = self.report(session)?;
        emit(format, &report, print_quirks)
    }
}

fn print_quirks(report: &QuirksReport) {
    println!("{} ({})", style("Quirk rules").bold().cyan(), report.source);
    println!("  Environment: {}", report.environment);
    println!();
    if report.rules.is_empty() {
        println!("  {}", style("no rules").dim());
        return;
    }
    for entry in &report.rules {
        let mark = match (entry.effective, entry.matches) {
            (true, _) => style("✓ fires").green(),
            (false, true) => style("~ shadowed").yellow(),
            (false, false) => style("✗ no match").dim(),
        };
        let action = match entry.rule.action {
            Action::Skip => "skip".to_string(),
            Action::Substitute => format!("expect {}", entry.rule.expect.as_deref().unwrap_or("?")),
        };
        println!(
            "  [{}] {mark} {} ({action}): {}",
            entry.index,
            entry.rule.operation.as_deref().unwrap_or("*"),
            entry.rule.reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clcontext_diagnostic::operations;

    fn command(operation: Option<&str>) -> QuirksCommand {
        QuirksCommand { file: None, operation: operation.map(String::from), dump: false }
    }

    #[test]
    fn test_amd_environment_fires_one_rule() {
        let env = Environment::new("linux", "OpenCL 2.0 AMD-APP (1642.5)");
        let report = command(None).evaluate("built-in".into(), RuleSet::known_quirks(), env);
        let fired: Vec<usize> =
            report.rules.iter().filter(|r| r.effective).map(|r| r.index).collect();
        assert_eq!(fired, vec![2]);
    }

    #[test]
    fn test_operation_filter() {
        let env = Environment::new("darwin", "OpenCL 1.2 (Dec 14 2014 22:29:47)");
        let report = command(Some(operations::CREATE_CONTEXT_NULL_DEVICES)).evaluate(
            "built-in".into(),
            RuleSet::known_quirks(),
            env,
        );
        assert_eq!(report.rules.len(), 1);
        assert!(report.rules[0].effective);
        assert_eq!(report.rules[0].rule.action, Action::Skip);
    }

    #[test]
    fn test_shadowed_rule_is_not_effective() {
        let rules = RuleSet::new(vec![ExclusionRule::new("first"), ExclusionRule::new("second")]);
        let report = command(None).evaluate("test".into(), &rules, Environment::new("linux", ""));
        assert!(report.rules[0].effective);
        assert!(report.rules[1].matches && !report.rules[1].effective);
    }

    #[test]
    fn test_loads_rules_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quirks.toml");
        std::fs::write(&path, "[[rule]]\nos = \"windows\"\nreason = \"test\"\n").unwrap();
        let cmd = QuirksCommand { file: Some(path), operation: None, dump: false };
        let (source, rules) = cmd.rule_set().unwrap();
        assert!(source.ends_with("quirks.toml"));
        assert_eq!(rules.len(), 1);
    }
}
