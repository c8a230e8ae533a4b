//! Backup-then-mutate primitive
//!
//! Pairs every value write or removal with a pre-change capture of the
//! target key's subtree. The capture policy is the caller's explicit
//! choice per step:
//!
//! - `BestEffort`: a failed capture is logged and the write proceeds
//! - `Required`: a failed capture fails the step before anything changes
//! - `Skip`: no capture attempted
//!
//! A capture against a key that does not exist yet is not a failure under
//! either policy: there is no prior state to lose, the attempt logs a
//! warning and the write then creates the path.

// Library API - reads are consumed by verification tooling
#![allow(dead_code)]

use crate::backup::BackupStore;
use crate::context::EngineContext;
use crate::error::{Result, TweakError};
use crate::store::{ConfigKey, ConfigStore};
use crate::types::{BackupPolicy, ConfigValue};
use std::sync::Arc;

/// Applies single-value mutations with pre-change backups.
pub struct Mutator {
    store: Arc<dyn ConfigStore>,
    backups: Arc<BackupStore>,
}

impl Mutator {
    pub fn new(store: Arc<dyn ConfigStore>, backups: Arc<BackupStore>) -> Self {
        Self { store, backups }
    }

    /// Write one value, capturing the target subtree first per `policy`.
    /// Missing intermediate containers are created by the write.
    pub fn set_value(
        &self,
        ctx: &EngineContext,
        key: &ConfigKey,
        name: &str,
        value: ConfigValue,
        policy: BackupPolicy,
    ) -> Result<()> {
        self.backup_first(ctx, key, policy)?;
        self.store.set(key, name, value.clone())?;
        log::debug!("set {}\\{} = {}", key, name, value);
        Ok(())
    }

    /// Remove one value, capturing the target subtree first per `policy`.
    /// Removing a value that is already absent succeeds quietly.
    pub fn remove_value(
        &self,
        ctx: &EngineContext,
        key: &ConfigKey,
        name: &str,
        policy: BackupPolicy,
    ) -> Result<()> {
        self.backup_first(ctx, key, policy)?;
        let existed = self.store.remove(key, name)?;
        if existed {
            log::debug!("removed {}\\{}", key, name);
        } else {
            log::debug!("remove {}\\{}: already absent", key, name);
        }
        Ok(())
    }

    /// Read one value, falling back to `default` on absence or any read
    /// error. Reads never fail the caller.
    pub fn get_value(&self, key: &ConfigKey, name: &str, default: ConfigValue) -> ConfigValue {
        match self.store.get(key, name) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                log::debug!("get {}\\{} failed ({}), using default", key, name, e);
                default
            }
        }
    }

    fn backup_first(
        &self,
        ctx: &EngineContext,
        key: &ConfigKey,
        policy: BackupPolicy,
    ) -> Result<()> {
        if !policy.wants_backup() {
            log::trace!("backup skipped for {} by policy", key);
            return Ok(());
        }
        match self.backups.capture(ctx, key) {
            // Captured, or key absent (capture already warned)
            Ok(_) => Ok(()),
            Err(e) => match policy {
                BackupPolicy::Required => Err(TweakError::BackupRequired {
                    key: key.clone(),
                    cause: e.to_string(),
                }),
                BackupPolicy::BestEffort => {
                    ctx.warning(format!(
                        "backup of {} failed ({}), proceeding without it",
                        key, e
                    ));
                    Ok(())
                }
                BackupPolicy::Skip => unreachable!("wants_backup filtered Skip"),
            },
        }
    }
}
