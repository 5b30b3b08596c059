/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use payroll_db::errors::SqlErrorKind;
use payroll_db::query::check_read_only;
use payroll_db::schema::{normalize_type, quote_ident};
use proptest::prelude::*;

// Property: type normalization is total and idempotent
proptest! {
    #[test]
    fn normalize_type_never_panics(raw in "\\PC*") {
        let _ = normalize_type(&raw);
    }

    #[test]
    fn normalize_type_is_idempotent(raw in "\\PC*") {
        let once = normalize_type(&raw);
        prop_assert_eq!(normalize_type(&once), once);
    }

    #[test]
    fn integer_display_width_is_irrelevant(
        base in prop::sample::select(vec!["smallint", "mediumint", "int", "bigint"]),
        width in 1u32..=255,
        unsigned in proptest::bool::ANY
    ) {
        let suffix = if unsigned { " unsigned" } else { "" };
        let legacy = format!("{}({}){}", base.to_uppercase(), width, suffix);
        let modern = format!("{}{}", base, suffix);
        prop_assert_eq!(normalize_type(&legacy), normalize_type(&modern));
    }
}

// Property: quoted identifiers are always a single backtick-delimited token
proptest! {
    #[test]
    fn quote_ident_round_trips_through_unescaping(ident in "\\PC{0,40}") {
        let quoted = quote_ident(&ident);
        prop_assert!(quoted.starts_with('`') && quoted.ends_with('`'));
        let inner = &quoted[1..quoted.len() - 1];
        prop_assert_eq!(inner.replace("``", "`"), ident);
    }
}

// Property: the read-only guard never lets a write through
proptest! {
    #[test]
    fn read_only_guard_never_panics(sql in "\\PC*") {
        let _ = check_read_only(&sql);
    }

    #[test]
    fn write_statements_are_rejected(
        verb in prop::sample::select(vec!["INSERT INTO", "UPDATE", "DELETE FROM", "DROP TABLE", "ALTER TABLE", "TRUNCATE"]),
        table in "[a-z_]{1,20}"
    ) {
        let sql = format!("{} {}", verb, table);
        prop_assert!(check_read_only(&sql).is_err());
    }

    #[test]
    fn stacked_statements_are_rejected(table in "[a-z_]{1,20}") {
        let sql = format!("SELECT * FROM {}; DROP TABLE {}", table, table);
        prop_assert!(check_read_only(&sql).is_err());
    }
}

// Property: only duplicate/exists codes count as already applied
proptest! {
    #[test]
    fn unknown_codes_are_never_already_applied(code in 2000u16..u16::MAX) {
        prop_assert_eq!(SqlErrorKind::from_code(code), SqlErrorKind::Other);
        prop_assert!(!SqlErrorKind::from_code(code).is_already_applied());
    }
}
