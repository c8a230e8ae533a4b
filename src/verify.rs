//! Read-only verification pass
//!
//! Re-checks specific values against their expected targets after an apply
//! (or any time later) and reports pass/fail without mutating anything.
//! Absence and read errors both count as mismatches; the check wants the
//! observable state, not an explanation.

// Library API - failure details are consumed by UI renderers
#![allow(dead_code)]

use crate::context::EngineContext;
use crate::store::{ConfigKey, ConfigStore};
use crate::types::ConfigValue;
use serde::{Deserialize, Serialize};

/// One expected value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCheck {
    pub label: String,
    pub key: ConfigKey,
    pub name: String,
    pub expect: ConfigValue,
}

/// One mismatch found by the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyFailure {
    pub label: String,
    pub expected: ConfigValue,
    /// What the store actually held; `None` when the value was absent or
    /// unreadable.
    pub actual: Option<ConfigValue>,
}

/// Aggregate result of one verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerifyReport {
    pub passed: usize,
    pub failures: Vec<VerifyFailure>,
}

impl VerifyReport {
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns a plain-text summary for logging/display.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Verification: {} passed, {} failed",
            self.passed,
            self.failures.len()
        )];
        for failure in &self.failures {
            let actual = failure
                .actual
                .as_ref()
                .map_or("<absent>".to_string(), ConfigValue::to_string);
            lines.push(format!(
                "  {}: expected {}, found {}",
                failure.label, failure.expected, actual
            ));
        }
        lines.join("\n")
    }
}

/// Run every check against the store. Never writes.
pub fn run_verification(
    ctx: &EngineContext,
    store: &dyn ConfigStore,
    checks: &[VerifyCheck],
) -> VerifyReport {
    let mut report = VerifyReport::default();

    for check in checks {
        let actual = match store.get(&check.key, &check.name) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("verify read of {}\\{} failed: {}", check.key, check.name, e);
                None
            }
        };
        if actual.as_ref() == Some(&check.expect) {
            ctx.success(format!("verify '{}': {} as expected", check.label, check.expect));
            report.passed += 1;
        } else {
            let found = actual
                .as_ref()
                .map_or("<absent>".to_string(), ConfigValue::to_string);
            ctx.error(format!(
                "verify '{}': expected {}, found {}",
                check.label, check.expect, found
            ));
            report.failures.push(VerifyFailure {
                label: check.label.clone(),
                expected: check.expect.clone(),
                actual,
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryAudit;
    use crate::store::{ConfigStore, DirStore};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn key(s: &str) -> ConfigKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_verification_reads_only() {
        let dir = tempdir().unwrap();
        let store = DirStore::open(dir.path()).unwrap();
        let k = key("system\\V");
        store.set(&k, "Mode", ConfigValue::Integer(2)).unwrap();
        let ctx = EngineContext::new(dir.path()).with_audit(Arc::new(MemoryAudit::new()));

        let checks = vec![
            VerifyCheck {
                label: "mode is 2".into(),
                key: k.clone(),
                name: "Mode".into(),
                expect: ConfigValue::Integer(2),
            },
            VerifyCheck {
                label: "missing value".into(),
                key: k.clone(),
                name: "Gone".into(),
                expect: ConfigValue::Integer(1),
            },
        ];
        let report = run_verification(&ctx, &store, &checks);

        assert_eq!(report.passed, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.all_passed());
        assert_eq!(report.failures[0].actual, None);
        // Verification must not have created the missing value
        assert_eq!(store.get(&k, "Gone").unwrap(), None);
    }

    #[test]
    fn test_summary_shows_mismatches() {
        let report = VerifyReport {
            passed: 3,
            failures: vec![VerifyFailure {
                label: "throttling off".into(),
                expected: ConfigValue::Integer(0),
                actual: Some(ConfigValue::Integer(1)),
            }],
        };
        let summary = report.summary();
        assert!(summary.contains("3 passed, 1 failed"));
        assert!(summary.contains("expected 0, found 1"));
    }
}
