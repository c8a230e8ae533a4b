//! tweakctl Library
//!
//! Core engine for applying reversible configuration tweaks to a live
//! system: pre-change subtree backups, grouped opt-in tiers with per-step
//! failure isolation, and rollback from the most recent backups.

pub mod backup;
pub mod cli;
pub mod config_file;
pub mod context;
pub mod detect;
pub mod error;
pub mod guards;
pub mod mutator;
pub mod orchestrator;
pub mod rollback;
pub mod runner;
pub mod services;
pub mod session;
pub mod store;
pub mod tier;
pub mod types;
pub mod verify;

// Re-export main types for convenience
pub use backup::{BackupHandle, BackupStore, ExportMechanism, ExternalExport, NativeExport, RestoreOutcome, SessionLock};
pub use config_file::{ActionKind, StepSpec, TierSpec, TweakPlan, VerifySpec};
pub use context::{AuditLevel, AuditLog, CancelToken, EngineContext, FacadeAudit, MemoryAudit};
pub use error::{Result, TweakError};
pub use guards::{GuardFn, GuardRegistry};
pub use mutator::Mutator;
pub use orchestrator::TierOrchestrator;
pub use rollback::{CompensatingAction, RollbackCoordinator, UndoReport};
pub use runner::{ToolInvocation, ToolOutput, run_tool};
pub use services::{ServiceController, SystemdController};
pub use session::{SessionReport, SessionState, StepOutcome, StepStatus, TierReport};
pub use store::{ConfigKey, ConfigStore, DirStore, KeySubtree, StoreRoot};
pub use tier::{MutationStep, StepAction, Tier};
pub use types::{BackupPolicy, ConfigValue, StartupMode, ValueKind};
pub use verify::{VerifyCheck, VerifyFailure, VerifyReport, run_verification};

// Platform detection feeding the built-in guards
pub use detect::{CpuVendor, FirmwareMode, PlatformFacts};
