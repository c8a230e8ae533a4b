//! tweakctl - Main entry point
//!
//! Wires the engine together for command line use: store and backup
//! directories from flags, guards from platform detection, SIGINT to the
//! cancellation token, and exit codes from the structured reports.

mod backup;
mod cli;
mod config_file;
mod context;
mod detect;
mod error;
mod guards;
mod mutator;
mod orchestrator;
mod rollback;
mod runner;
mod services;
mod session;
mod store;
mod tier;
mod types;
mod verify;

use log::{debug, error, info};
use std::path::Path;
use std::sync::Arc;

use crate::backup::{BackupStore, NativeExport, SessionLock};
use crate::cli::{Cli, Commands};
use crate::config_file::TweakPlan;
use crate::context::{CancelToken, EngineContext};
use crate::detect::PlatformFacts;
use crate::guards::GuardRegistry;
use crate::mutator::Mutator;
use crate::orchestrator::TierOrchestrator;
use crate::rollback::RollbackCoordinator;
use crate::services::SystemdController;
use crate::session::SessionState;
use crate::store::{ConfigKey, DirStore};
use crate::verify::run_verification;

/// Initialize the logger with appropriate settings
fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;

    Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env() // Allows RUST_LOG env var to override
        .init();
}

/// Main application entry point
fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    info!("tweakctl starting up");

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    // SIGINT requests cooperative cancellation; the engine stops between
    // steps, never mid-write
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::warn!("interrupt received, finishing current step");
            cancel.cancel();
        }) {
            log::warn!("failed to install interrupt handler: {}", e);
        }
    }

    let ctx = EngineContext::new(&cli.backup_dir)
        .with_cancel(cancel)
        .with_dry_run(cli.dry_run);

    match &cli.command {
        Commands::Apply { plan, tiers, json } => {
            run_apply(&ctx, &cli.store, plan, tiers, *json)?;
        }
        Commands::Undo { plan, json } => {
            run_undo(&ctx, &cli.store, plan, *json)?;
        }
        Commands::Verify { plan } => {
            run_verify(&ctx, &cli.store, plan)?;
        }
        Commands::Validate { plan } => {
            info!("Validating plan file: {:?}", plan);
            match load_validated_plan(plan) {
                Ok((plan, _)) => {
                    info!("Plan validation successful");
                    println!("✓ Plan file is valid: {}", plan.module);
                }
                Err(e) => {
                    error!("Plan validation failed: {}", e);
                    eprintln!("✗ Plan validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Backups { key } => {
            run_backups(&ctx, &cli.store, key.as_deref())?;
        }
    }

    Ok(())
}

/// Load a plan and validate it against the built-in guard names. The
/// registry comes back too so detection runs once per invocation.
fn load_validated_plan(path: &Path) -> crate::error::Result<(TweakPlan, GuardRegistry)> {
    let plan = TweakPlan::load_from_file(path)?;
    let registry = PlatformFacts::detect().guard_registry();
    plan.validate(&registry.names())?;
    Ok((plan, registry))
}

fn run_apply(
    ctx: &EngineContext,
    store_dir: &Path,
    plan_path: &Path,
    selected_tiers: &[String],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (plan, guards) = load_validated_plan(plan_path)?;
    info!("applying plan '{}'", plan.module);

    // One session at a time over a backup directory; dry runs touch nothing
    // and skip the lock
    let _lock = if ctx.dry_run {
        None
    } else {
        Some(SessionLock::acquire(&ctx.backup_dir)?)
    };

    let store = Arc::new(DirStore::open(store_dir)?);
    let backups = Arc::new(BackupStore::new(
        &ctx.backup_dir,
        Arc::new(NativeExport::new(store.clone())),
    )?);
    let mutator = Mutator::new(store, backups);

    let tiers = plan.to_tiers(selected_tiers)?;
    let orchestrator = TierOrchestrator::new(&mutator, &guards);
    let report = orchestrator.run(ctx, &tiers);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }

    match report.state {
        SessionState::Completed => Ok(()),
        SessionState::CompletedWithErrors | SessionState::Aborted => {
            error!("apply of '{}' finished with problems", plan.module);
            std::process::exit(1);
        }
        // run() always returns a terminal state
        other => {
            error!("unexpected session state: {}", other);
            std::process::exit(1);
        }
    }
}

fn run_undo(
    ctx: &EngineContext,
    store_dir: &Path,
    plan_path: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (plan, _) = load_validated_plan(plan_path)?;
    info!("undoing plan '{}'", plan.module);

    if ctx.dry_run {
        println!(
            "dry-run: would restore {} keys and run {} compensating actions",
            plan.undo_keys.len(),
            plan.compensating.len()
        );
        return Ok(());
    }

    let _lock = SessionLock::acquire(&ctx.backup_dir)?;

    let store = Arc::new(DirStore::open(store_dir)?);
    let backups = BackupStore::new(
        &ctx.backup_dir,
        Arc::new(NativeExport::new(store)),
    )?;
    let services = SystemdController::new();
    let coordinator = RollbackCoordinator::new(&backups, &services);

    let keys = plan.undo_keys()?;
    let report = coordinator.undo(ctx, &keys, &plan.compensating);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }

    if report.is_clean() {
        Ok(())
    } else {
        error!("undo of '{}' finished with problems", plan.module);
        std::process::exit(1);
    }
}

fn run_verify(
    ctx: &EngineContext,
    store_dir: &Path,
    plan_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let (plan, _) = load_validated_plan(plan_path)?;
    let store = DirStore::open(store_dir)?;
    let checks = plan.verify_checks()?;
    let report = run_verification(ctx, &store, &checks);

    println!("{}", report.summary());
    if report.all_passed() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn run_backups(
    ctx: &EngineContext,
    store_dir: &Path,
    key: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(DirStore::open(store_dir)?);
    let backups = BackupStore::new(
        &ctx.backup_dir,
        Arc::new(NativeExport::new(store)),
    )?;

    let key = key.map(|k| k.parse::<ConfigKey>()).transpose()?;
    let handles = backups.list(key.as_ref())?;

    if handles.is_empty() {
        println!("No backup artifacts found");
        return Ok(());
    }
    for handle in handles {
        println!(
            "{}  {}  {}",
            handle.captured_at.format("%Y-%m-%d %H:%M:%S%.3f UTC"),
            handle.key,
            handle.path.display()
        );
    }
    Ok(())
}
