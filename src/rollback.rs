//! Rollback coordination
//!
//! Undo walks a static, per-plan list of keys and restores each from its
//! most recent backup, then runs the plan's compensating actions: the
//! non-key side effects (service startup modes, arbitrary repair commands)
//! that the generic backup model cannot capture.
//!
//! Everything here is best-effort and isolation-first: a key with no backup
//! is an informational skip, a failed restore is logged and the walk
//! continues, and each compensating action is wrapped individually so one
//! failure never blocks the others. Undo is callable at any time, whether
//! or not an apply session ever ran.

#![allow(dead_code)] // Report accessors are available for UI consumers

use crate::backup::{BackupStore, RestoreOutcome};
use crate::context::EngineContext;
use crate::error::Result;
use crate::runner::{ToolInvocation, run_tool};
use crate::services::ServiceController;
use crate::store::ConfigKey;
use crate::types::StartupMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-key side effect undo must perform explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CompensatingAction {
    /// Put a service back into a startup mode, optionally starting it.
    Service {
        service: String,
        startup: StartupMode,
        #[serde(default)]
        start: bool,
    },
    /// Run an arbitrary repair command.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl fmt::Display for CompensatingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service { service, startup, start } => {
                write!(f, "service {} -> {}", service, startup)?;
                if *start {
                    write!(f, " (start)")?;
                }
                Ok(())
            }
            Self::Command { program, args } => {
                write!(f, "command {} {}", program, args.join(" "))
            }
        }
    }
}

/// Aggregate result of one undo run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UndoReport {
    pub restored: usize,
    pub no_backup: usize,
    pub failed: usize,
    pub actions_ok: usize,
    pub actions_failed: usize,
    pub cancelled: bool,
}

impl UndoReport {
    /// True when nothing went wrong (skips are fine).
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.actions_failed == 0 && !self.cancelled
    }

    /// Returns a plain-text summary for logging/display.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Undo: {} restored, {} without backup, {} failed; actions: {} ok, {} failed",
            self.restored, self.no_backup, self.failed, self.actions_ok, self.actions_failed
        );
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

/// Restores keys from their latest backups and runs compensating actions.
pub struct RollbackCoordinator<'a> {
    backups: &'a BackupStore,
    services: &'a dyn ServiceController,
}

impl<'a> RollbackCoordinator<'a> {
    pub fn new(backups: &'a BackupStore, services: &'a dyn ServiceController) -> Self {
        Self { backups, services }
    }

    /// Restore every key from its most recent backup, then run the
    /// compensating actions. Never stops early except on cancellation.
    pub fn undo(
        &self,
        ctx: &EngineContext,
        keys: &[ConfigKey],
        actions: &[CompensatingAction],
    ) -> UndoReport {
        let mut report = UndoReport::default();

        for key in keys {
            if ctx.cancel.is_cancelled() {
                ctx.warning("cancellation requested, stopping undo");
                report.cancelled = true;
                return report;
            }
            match self.backups.restore_latest(ctx, key) {
                Ok(RestoreOutcome::Restored(_)) => report.restored += 1,
                Ok(RestoreOutcome::NoBackupFound) => {
                    ctx.info(format!("no backup found for {}, skipping", key));
                    report.no_backup += 1;
                }
                Err(e) => {
                    ctx.error(format!("restore of {} failed: {}", key, e));
                    report.failed += 1;
                }
            }
        }

        for action in actions {
            if ctx.cancel.is_cancelled() {
                ctx.warning("cancellation requested, stopping undo");
                report.cancelled = true;
                return report;
            }
            match self.run_action(action) {
                Ok(()) => {
                    ctx.success(format!("compensating action: {}", action));
                    report.actions_ok += 1;
                }
                Err(e) => {
                    ctx.error(format!("compensating action '{}' failed: {}", action, e));
                    report.actions_failed += 1;
                }
            }
        }

        report
    }

    fn run_action(&self, action: &CompensatingAction) -> Result<()> {
        match action {
            CompensatingAction::Service { service, startup, start } => {
                self.services.set_startup(service, *startup)?;
                if *start {
                    self.services.start(service)?;
                }
                Ok(())
            }
            CompensatingAction::Command { program, args } => {
                let output = run_tool(&ToolInvocation::new(program.clone(), args.clone()))?;
                output.ensure_success(&format!("command {}", program))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{BackupStore, ExportMechanism, NativeExport};
    use crate::context::{AuditLevel, MemoryAudit};
    use crate::error::TweakError;
    use crate::store::{ConfigStore, DirStore};
    use crate::types::ConfigValue;
    use chrono::{DateTime, Utc};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Service controller that records calls and optionally fails some.
    struct RecordingController {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingController {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self { calls: Mutex::new(Vec::new()), fail_on }
        }

        fn record(&self, call: String) -> Result<()> {
            let fail = self.fail_on.is_some_and(|f| call.contains(f));
            self.calls.lock().unwrap().push(call.clone());
            if fail {
                Err(TweakError::tool(format!("injected failure: {}", call)))
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ServiceController for RecordingController {
        fn set_startup(&self, service: &str, mode: StartupMode) -> Result<()> {
            self.record(format!("set_startup {} {}", service, mode))
        }
        fn start(&self, service: &str) -> Result<()> {
            self.record(format!("start {}", service))
        }
        fn stop(&self, service: &str) -> Result<()> {
            self.record(format!("stop {}", service))
        }
    }

    /// Delegates to NativeExport but fails imports for keys containing "Bad".
    struct FlakyImport {
        inner: NativeExport,
    }

    impl ExportMechanism for FlakyImport {
        fn export(&self, key: &ConfigKey, at: DateTime<Utc>, dest: &Path) -> Result<bool> {
            self.inner.export(key, at, dest)
        }
        fn import(&self, key: &ConfigKey, artifact: &Path) -> Result<()> {
            if key.path.contains("Bad") {
                return Err(TweakError::backup("import tool rejected artifact"));
            }
            self.inner.import(key, artifact)
        }
        fn peek_key(&self, artifact: &Path) -> Result<Option<ConfigKey>> {
            self.inner.peek_key(artifact)
        }
    }

    fn key(s: &str) -> ConfigKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_missing_backup_does_not_block_other_keys() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DirStore::open(dir.path().join("store")).unwrap());
        let backups = BackupStore::new(
            dir.path().join("backups"),
            Arc::new(NativeExport::new(store.clone())),
        )
        .unwrap();
        let audit = Arc::new(MemoryAudit::new());
        let ctx = EngineContext::new(dir.path().join("backups")).with_audit(audit.clone());

        let a = key("system\\A");
        let never_backed_up = key("system\\NeverTouched");
        store.set(&a, "X", ConfigValue::Integer(1)).unwrap();
        backups.capture(&ctx, &a).unwrap().unwrap();
        store.set(&a, "X", ConfigValue::Integer(2)).unwrap();

        let services = RecordingController::new(None);
        let coordinator = RollbackCoordinator::new(&backups, &services);
        let report = coordinator.undo(&ctx, &[never_backed_up.clone(), a.clone()], &[]);

        assert_eq!(report.restored, 1);
        assert_eq!(report.no_backup, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(store.get(&a, "X").unwrap(), Some(ConfigValue::Integer(1)));
        assert!(audit.contains(AuditLevel::Info, "no backup found"));
    }

    #[test]
    fn test_failed_restore_continues_with_remaining_keys() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DirStore::open(dir.path().join("store")).unwrap());
        let mechanism = Arc::new(FlakyImport {
            inner: NativeExport::new(store.clone()),
        });
        let backups = BackupStore::new(dir.path().join("backups"), mechanism).unwrap();
        let audit = Arc::new(MemoryAudit::new());
        let ctx = EngineContext::new(dir.path().join("backups")).with_audit(audit.clone());

        let bad = key("system\\Bad");
        let good = key("system\\Good");
        store.set(&bad, "X", ConfigValue::Integer(1)).unwrap();
        store.set(&good, "X", ConfigValue::Integer(1)).unwrap();
        backups.capture(&ctx, &bad).unwrap().unwrap();
        backups.capture(&ctx, &good).unwrap().unwrap();
        store.set(&good, "X", ConfigValue::Integer(9)).unwrap();

        let services = RecordingController::new(None);
        let coordinator = RollbackCoordinator::new(&backups, &services);
        let report = coordinator.undo(&ctx, &[bad, good.clone()], &[]);

        assert_eq!(report.failed, 1);
        assert_eq!(report.restored, 1);
        assert_eq!(store.get(&good, "X").unwrap(), Some(ConfigValue::Integer(1)));
        assert!(audit.contains(AuditLevel::Error, "restore of system\\Bad failed"));
    }

    #[test]
    fn test_compensating_actions_are_individually_isolated() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DirStore::open(dir.path().join("store")).unwrap());
        let backups = BackupStore::new(
            dir.path().join("backups"),
            Arc::new(NativeExport::new(store)),
        )
        .unwrap();
        let ctx = EngineContext::new(dir.path().join("backups"))
            .with_audit(Arc::new(MemoryAudit::new()));

        let services = RecordingController::new(Some("broken"));
        let coordinator = RollbackCoordinator::new(&backups, &services);

        let actions = vec![
            CompensatingAction::Service {
                service: "broken".into(),
                startup: StartupMode::Automatic,
                start: true,
            },
            CompensatingAction::Service {
                service: "search".into(),
                startup: StartupMode::Automatic,
                start: true,
            },
        ];
        let report = coordinator.undo(&ctx, &[], &actions);

        assert_eq!(report.actions_failed, 1);
        assert_eq!(report.actions_ok, 1);
        // The second action ran in full despite the first failing
        let calls = services.calls();
        assert!(calls.contains(&"set_startup search automatic".to_string()));
        assert!(calls.contains(&"start search".to_string()));
    }

    #[test]
    fn test_undo_with_no_backups_is_a_noop() {
        let dir = tempdir().unwrap();
        let store = Arc::new(DirStore::open(dir.path().join("store")).unwrap());
        let backups = BackupStore::new(
            dir.path().join("backups"),
            Arc::new(NativeExport::new(store)),
        )
        .unwrap();
        let ctx = EngineContext::new(dir.path().join("backups"))
            .with_audit(Arc::new(MemoryAudit::new()));

        let services = RecordingController::new(None);
        let coordinator = RollbackCoordinator::new(&backups, &services);
        let report = coordinator.undo(&ctx, &[key("system\\A"), key("system\\B")], &[]);

        assert_eq!(report.no_backup, 2);
        assert!(report.is_clean());
    }

    #[test]
    fn test_action_serde_shape() {
        let action = CompensatingAction::Service {
            service: "search".into(),
            startup: StartupMode::Automatic,
            start: true,
        };
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"service","service":"search","startup":"automatic","start":true}"#
        );
    }
}
