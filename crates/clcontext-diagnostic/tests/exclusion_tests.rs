//! Exclusion chains as the context suite writes them.

use std::cell::Cell;

use clcontext_diagnostic::{Diagnostic, Environment, Identity, RuleSet, Verdict, operations};

const APPLE: &str = "OpenCL 1.2 (Dec 14 2014 22:29:47)";
const AMD: &str = "OpenCL 2.0 AMD-APP (1642.5)";

/// The `createContextFromType(props, 0)` chain; returns the name it asserted.
fn zero_mask_chain(env: Environment, platform: Option<Identity>) -> &'static str {
    let diag = Diagnostic::new(env);
    let asserted = Cell::new("");

    let _ = diag
        .exclude(platform, None)
        .os("darwin")
        .driver(APPLE)
        .because("It returns INVALID_DEVICE instead of invalid value")
        .should(|| asserted.set("INVALID_DEVICE"))
        .raise();

    let _ = diag
        .exclude(platform, None)
        .os("linux")
        .driver(AMD)
        .because("It returns DEVICE_NOT_FOUND instead of invalid value")
        .should(|| asserted.set("DEVICE_NOT_FOUND"))
        .raise();

    diag.otherwise(|| asserted.set("INVALID_DEVICE_TYPE"));
    asserted.get()
}

#[test]
fn apple_driver_substitutes_invalid_device() {
    assert_eq!(zero_mask_chain(Environment::new("darwin", APPLE), None), "INVALID_DEVICE");
}

#[test]
fn amd_driver_substitutes_device_not_found() {
    assert_eq!(zero_mask_chain(Environment::new("linux", AMD), None), "DEVICE_NOT_FOUND");
}

#[test]
fn conformant_driver_falls_through() {
    let env = Environment::new("linux", "OpenCL 3.0 NVIDIA CUDA");
    assert_eq!(zero_mask_chain(env, None), "INVALID_DEVICE_TYPE");
}

#[test]
fn right_driver_on_wrong_os_falls_through() {
    assert_eq!(zero_mask_chain(Environment::new("windows", AMD), None), "INVALID_DEVICE_TYPE");
}

#[test]
fn platform_identity_narrows_the_rule() {
    let env = Environment::new("darwin", APPLE).with_platform(0x10);
    assert_eq!(zero_mask_chain(env.clone(), Some(Identity::new(0x10))), "INVALID_DEVICE");
    assert_eq!(zero_mask_chain(env, Some(Identity::new(0x11))), "INVALID_DEVICE_TYPE");
}

#[test]
fn skip_rule_waives_the_test() {
    let diag = Diagnostic::new(Environment::new("darwin", APPLE));
    let verdict = diag
        .exclude(None, None)
        .os("darwin")
        .driver(APPLE)
        .because("It returns INVALID_DEVICE instead of invalid value")
        .raise();
    assert_eq!(
        verdict,
        Verdict::Excluded { reason: "It returns INVALID_DEVICE instead of invalid value".into() }
    );
}

#[test]
fn second_matching_rule_never_runs() {
    let diag = Diagnostic::new(Environment::new("linux", AMD));
    let first = diag.exclude(None, None).os("linux").because("first").raise();
    let second_ran = Cell::new(false);
    let second = diag.exclude(None, None).because("second").should(|| second_ran.set(true)).raise();
    assert!(first.is_excluded());
    assert!(second.is_proceed());
    assert!(!second_ran.get());
}

#[test]
fn loaded_rule_raises_like_the_fluent_one() {
    let env = Environment::new("darwin", APPLE);
    let rule = RuleSet::known_quirks()
        .first_match(&env, operations::CREATE_CONTEXT_NULL_DEVICES)
        .cloned()
        .unwrap();
    let diag = Diagnostic::new(env);
    assert!(diag.raise_rule(&rule).is_excluded());
    assert!(diag.fired());
}

#[test]
fn verdict_display_is_stable() {
    insta::assert_snapshot!(Verdict::Proceed.to_string(), @"proceed");
    insta::assert_snapshot!(
        Verdict::Substituted { reason: "driver quirk".into() }.to_string(),
        @"substituted: driver quirk"
    );
}
