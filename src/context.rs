//! Engine context
//!
//! No process-wide mutable state anywhere in the engine: every engine call
//! receives an explicit `EngineContext` carrying the audit sink, the backup
//! artifact directory and the cooperative cancellation token.
//!
//! # Audit vs. diagnostics
//!
//! `AuditLog` is the user-facing outcome trail (what was applied, skipped,
//! restored). The engine still uses the `log` facade for developer
//! diagnostics; `FacadeAudit` bridges the two so a plain CLI run needs no
//! extra wiring.

// Library API - the in-memory audit sink is for test consumers
#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use strum::{Display, EnumIter, EnumString};

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum AuditLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Sink for the user-facing outcome trail.
///
/// The engine never formats timestamps, colors or destinations; that belongs
/// to whoever implements this trait.
pub trait AuditLog: Send + Sync {
    fn log(&self, level: AuditLevel, message: &str);
}

/// Default audit sink: forwards to the `log` facade.
#[derive(Debug, Default)]
pub struct FacadeAudit;

impl AuditLog for FacadeAudit {
    fn log(&self, level: AuditLevel, message: &str) {
        match level {
            AuditLevel::Info => log::info!("{}", message),
            AuditLevel::Success => log::info!("✓ {}", message),
            AuditLevel::Warning => log::warn!("{}", message),
            AuditLevel::Error => log::error!("{}", message),
        }
    }
}

/// In-memory audit sink for tests: records every entry for later assertions.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    entries: Mutex<Vec<(AuditLevel, String)>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded entries.
    pub fn entries(&self) -> Vec<(AuditLevel, String)> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }

    /// Whether any entry at `level` contains `needle`.
    pub fn contains(&self, level: AuditLevel, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl AuditLog for MemoryAudit {
    fn log(&self, level: AuditLevel, message: &str) {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push((level, message.to_string()));
    }
}

/// Cooperative cancellation flag, checked between steps (never mid-write).
///
/// Cloned tokens share the same flag, so a signal handler can cancel a run
/// owned by the main thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Everything an engine call needs besides the store itself.
#[derive(Clone)]
pub struct EngineContext {
    pub audit: Arc<dyn AuditLog>,
    pub backup_dir: PathBuf,
    pub cancel: CancelToken,
    /// Evaluate guards and log intended writes without mutating anything.
    pub dry_run: bool,
}

impl EngineContext {
    /// Context with the default facade audit sink and a fresh cancel token.
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            audit: Arc::new(FacadeAudit),
            backup_dir: backup_dir.into(),
            cancel: CancelToken::new(),
            dry_run: false,
        }
    }

    /// Replace the audit sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = audit;
        self
    }

    /// Share an externally owned cancel token (e.g. wired to SIGINT).
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.audit.log(AuditLevel::Info, message.as_ref());
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.audit.log(AuditLevel::Success, message.as_ref());
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.audit.log(AuditLevel::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.audit.log(AuditLevel::Error, message.as_ref());
    }
}
