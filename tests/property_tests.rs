//! Property-Based Tests for tweakctl
//!
//! Uses proptest for testing invariants and edge cases:
//! - Key parse → display round-trips
//! - Artifact stem sanitization stays filesystem-safe
//! - Value serialization round-trips
//! - Backup/restore round-trips for arbitrary values

use proptest::prelude::*;
use std::sync::Arc;
use tempfile::tempdir;

use tweakctl::{
    BackupStore, ConfigKey, ConfigStore, ConfigValue, DirStore, EngineContext, MemoryAudit,
    NativeExport,
};

// =============================================================================
// Key Property Tests
// =============================================================================

/// Strategy for a valid path segment (letters, digits, space, dot, dash,
/// underscore; non-empty, no leading/trailing whitespace).
fn segment_strategy() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Za-z0-9_][A-Za-z0-9 ._-]{0,10}[A-Za-z0-9_]|[A-Za-z0-9_]")
        .expect("valid regex")
}

fn key_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![
            Just("system"),
            Just("software"),
            Just("services"),
            Just("boot")
        ],
        proptest::collection::vec(segment_strategy(), 1..4),
    )
        .prop_map(|(root, segments)| format!("{}\\{}", root, segments.join("\\")))
}

proptest! {
    /// ConfigKey: parse → display → parse is identity
    #[test]
    fn key_roundtrip(raw in key_strategy()) {
        let key: ConfigKey = raw.parse().expect("should parse");
        let display = key.to_string();
        let reparsed: ConfigKey = display.parse().expect("display should reparse");
        prop_assert_eq!(key, reparsed);
    }

    /// Sanitized stems never contain characters unsafe for file names
    #[test]
    fn sanitized_stem_is_filesystem_safe(raw in key_strategy()) {
        let key: ConfigKey = raw.parse().expect("should parse");
        let stem = key.sanitized_stem();
        prop_assert!(!stem.is_empty());
        prop_assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
    }
}

// =============================================================================
// Value Property Tests
// =============================================================================

fn value_strategy() -> impl Strategy<Value = ConfigValue> {
    prop_oneof![
        any::<i64>().prop_map(ConfigValue::Integer),
        "[ -~]{0,32}".prop_map(ConfigValue::Text),
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(ConfigValue::Binary),
    ]
}

proptest! {
    /// ConfigValue: JSON round-trip is identity
    #[test]
    fn value_json_roundtrip(value in value_strategy()) {
        let json = serde_json::to_string(&value).expect("serialize");
        let back: ConfigValue = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, value);
    }
}

// =============================================================================
// Backup/Restore Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// For any initial and overwritten value, capture → mutate → restore
    /// brings back the initial value, and restoring twice changes nothing.
    #[test]
    fn backup_restore_roundtrip(initial in value_strategy(), replacement in value_strategy()) {
        let dir = tempdir().expect("tempdir");
        let store = Arc::new(DirStore::open(dir.path().join("store")).expect("store"));
        let backups = BackupStore::new(
            dir.path().join("backups"),
            Arc::new(NativeExport::new(store.clone())),
        )
        .expect("backups");
        let ctx = EngineContext::new(dir.path().join("backups"))
            .with_audit(Arc::new(MemoryAudit::new()));

        let key: ConfigKey = "system\\Prop\\Target".parse().expect("key");
        store.set(&key, "V", initial.clone()).expect("seed");

        let handle = backups.capture(&ctx, &key).expect("capture").expect("handle");
        store.set(&key, "V", replacement).expect("overwrite");

        backups.restore(&ctx, &handle).expect("restore");
        prop_assert_eq!(store.get(&key, "V").expect("get"), Some(initial.clone()));

        // Idempotence
        backups.restore(&ctx, &handle).expect("restore again");
        prop_assert_eq!(store.get(&key, "V").expect("get"), Some(initial));
    }
}
