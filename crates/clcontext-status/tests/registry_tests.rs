//! Integration tests for the status registry public API.

use clcontext_status::{ClError, ErrorKind, RegistryError, SUCCESS, check, kind_for, lookup};

// ── lookup ───────────────────────────────────────────────────────────────────

#[test]
fn lookup_context_creation_failures() {
    assert_eq!(lookup(-1), Ok(ErrorKind::DeviceNotFound));
    assert_eq!(lookup(-30), Ok(ErrorKind::InvalidValue));
    assert_eq!(lookup(-31), Ok(ErrorKind::InvalidDeviceType));
    assert_eq!(lookup(-33), Ok(ErrorKind::InvalidDevice));
}

#[test]
fn lookup_rejects_success() {
    assert_eq!(lookup(SUCCESS), Err(RegistryError::UnknownCode(0)));
}

#[test]
fn lookup_rejects_out_of_range() {
    assert!(lookup(1).is_err());
    assert!(lookup(-71).is_err());
    assert!(lookup(i32::MIN).is_err());
}

#[test]
fn lookup_is_total_over_documented_range() {
    for code in (-19..=-1).chain(-70..=-30) {
        let kind = lookup(code).unwrap_or_else(|e| panic!("code {code} missing: {e}"));
        assert_eq!(kind.code(), code);
    }
}

// ── kind_for ─────────────────────────────────────────────────────────────────

#[test]
fn kind_for_stable_names() {
    assert_eq!(kind_for("INVALID_VALUE"), Ok(ErrorKind::InvalidValue));
    assert_eq!(kind_for("INVALID_DEVICE"), Ok(ErrorKind::InvalidDevice));
    assert_eq!(kind_for("INVALID_DEVICE_TYPE"), Ok(ErrorKind::InvalidDeviceType));
    assert_eq!(kind_for("DEVICE_NOT_FOUND"), Ok(ErrorKind::DeviceNotFound));
}

#[test]
fn kind_for_unknown_name() {
    let err = kind_for("NOT_A_STATUS").unwrap_err();
    assert_eq!(err, RegistryError::UnknownName("NOT_A_STATUS".into()));
    assert!(err.to_string().contains("NOT_A_STATUS"));
}

#[test]
fn from_str_uses_symbolic_names() {
    let kind: ErrorKind = "INVALID_CONTEXT".parse().unwrap();
    assert_eq!(kind, ErrorKind::InvalidContext);
}

// ── check / ClError ──────────────────────────────────────────────────────────

#[test]
fn check_success_is_ok() {
    assert_eq!(check(SUCCESS), Ok(()));
}

#[test]
fn check_translates_known_status() {
    let err = check(-30).unwrap_err();
    assert_eq!(err, ClError::Native(ErrorKind::InvalidValue));
    assert!(err.is(ErrorKind::InvalidValue));
    assert_eq!(err.status(), -30);
}

#[test]
fn check_keeps_unknown_status() {
    let err = check(-1001).unwrap_err();
    assert_eq!(err, ClError::UnknownStatus(-1001));
    assert_eq!(err.kind(), None);
    assert_eq!(err.status(), -1001);
}

#[test]
fn native_error_display_is_exact_message() {
    for kind in ErrorKind::ALL {
        assert_eq!(ClError::Native(*kind).to_string(), kind.message());
    }
}

#[test]
fn context_messages_are_stable() {
    insta::assert_snapshot!(ErrorKind::InvalidValue.message(), @"Invalid value");
    insta::assert_snapshot!(ErrorKind::InvalidDevice.message(), @"Invalid device");
    insta::assert_snapshot!(ErrorKind::InvalidDeviceType.message(), @"Invalid device type");
    insta::assert_snapshot!(ErrorKind::DeviceNotFound.message(), @"Device not found");
}

#[test]
fn display_is_symbolic_name() {
    assert_eq!(ErrorKind::InvalidDeviceType.to_string(), "INVALID_DEVICE_TYPE");
}

#[test]
fn all_is_ordered_by_descending_code() {
    let codes: Vec<i32> = ErrorKind::ALL.iter().map(|k| k.code()).collect();
    let mut sorted = codes.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(codes, sorted);
}
