use clcontext_status::{ClError, ErrorKind, check, kind_for, lookup};
use proptest::prelude::*;

fn arb_kind() -> impl Strategy<Value = ErrorKind> {
    prop::sample::select(ErrorKind::ALL.to_vec())
}

proptest! {
    /// `lookup` inverts `code` for every kind.
    #[test]
    fn lookup_inverts_code(kind in arb_kind()) {
        prop_assert_eq!(lookup(kind.code()), Ok(kind));
    }

    /// `kind_for` inverts `name`, with or without the `CL_` prefix.
    #[test]
    fn kind_for_inverts_name(kind in arb_kind()) {
        prop_assert_eq!(kind_for(kind.name()), Ok(kind));
        let prefixed = format!("CL_{}", kind.name());
        prop_assert_eq!(kind_for(&prefixed), Ok(kind));
    }

    /// `check` agrees with `lookup` for every non-success status.
    #[test]
    fn check_agrees_with_lookup(code in any::<i32>().prop_filter("non-success", |c| *c != 0)) {
        let err = check(code).unwrap_err();
        match lookup(code) {
            Ok(kind) => prop_assert_eq!(err, ClError::Native(kind)),
            Err(_) => prop_assert_eq!(err, ClError::UnknownStatus(code)),
        }
    }

    /// Positive codes are never failures in the table.
    #[test]
    fn positive_codes_are_unknown(code in 1..i32::MAX) {
        prop_assert!(lookup(code).is_err());
    }

    /// Serde carries kinds by symbolic name.
    #[test]
    fn serde_uses_symbolic_name(kind in arb_kind()) {
        let value = serde_json::to_value(kind).unwrap();
        prop_assert_eq!(value.as_str(), Some(kind.name()));
    }
}
