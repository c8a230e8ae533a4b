//! Subtree backup and restore
//!
//! Captures a key's entire subtree into a timestamped, self-contained
//! artifact before the first mutation touches it, and restores the most
//! recent artifact on demand. Artifacts accumulate; a newer capture never
//! overwrites an older one.
//!
//! # Artifact layout
//!
//! One file per capture in the context's backup directory, named
//! `{UTC timestamp}-{sanitized key path}.json`. The timestamp format is
//! lexicographically sortable, so "latest" is a plain string comparison.
//! Artifacts are self-contained and restorable by a different process than
//! the one that wrote them.
//!
//! # Known limitation
//!
//! Restore is coarse-grained: it re-imports the captured subtree wholesale,
//! sibling values included. Changes made to the same subtree *after* the
//! capture, by this session or anything else, are reverted along with it.

// Library API - the external mechanism is for platforms without native access
#![allow(dead_code)]

use crate::context::EngineContext;
use crate::error::{Result, TweakError};
use crate::runner::{ToolInvocation, run_tool};
use crate::store::{ConfigKey, ConfigStore, KeySubtree};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Timestamp format used in artifact file names. No separators that could
/// be confused with the `-` between timestamp and key stem; nanosecond
/// precision so two captures of the same key in one session cannot collide.
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";

/// Name of the exclusive lock file inside the backup directory.
const LOCK_FILE: &str = ".session-lock";

/// Identifies one immutable backup artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    pub key: ConfigKey,
    pub captured_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// Result of a restore-latest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(BackupHandle),
    /// No artifact exists for the key. Informational, not an error.
    NoBackupFound,
}

/// On-disk content of a natively exported artifact.
#[derive(Debug, Serialize, Deserialize)]
struct ArtifactFile {
    key: ConfigKey,
    captured_at: DateTime<Utc>,
    subtree: KeySubtree,
}

/// How subtrees get out of and back into the store.
///
/// `NativeExport` walks the `ConfigStore` directly and is the default.
/// `ExternalExport` drives a privileged export/import tool and exists for
/// platforms where only such a tool can read the real store.
pub trait ExportMechanism: Send + Sync {
    /// Export the subtree at `key` into `dest`. Returns `Ok(false)` without
    /// creating anything when the key does not exist.
    fn export(&self, key: &ConfigKey, captured_at: DateTime<Utc>, dest: &Path) -> Result<bool>;

    /// Re-import a previously exported artifact over `key`.
    fn import(&self, key: &ConfigKey, artifact: &Path) -> Result<()>;

    /// The key an artifact claims to describe, if the format records one.
    /// Used to reject sanitize-collision false matches during restore.
    fn peek_key(&self, artifact: &Path) -> Result<Option<ConfigKey>>;
}

/// Export mechanism that walks the store through its trait.
pub struct NativeExport {
    store: Arc<dyn ConfigStore>,
}

impl NativeExport {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }
}

impl ExportMechanism for NativeExport {
    fn export(&self, key: &ConfigKey, captured_at: DateTime<Utc>, dest: &Path) -> Result<bool> {
        let Some(subtree) = self.store.export_subtree(key)? else {
            return Ok(false);
        };
        let artifact = ArtifactFile {
            key: key.clone(),
            captured_at,
            subtree,
        };
        let json = serde_json::to_string_pretty(&artifact)?;
        fs::write(dest, json)
            .map_err(|e| TweakError::backup(format!("writing {}: {}", dest.display(), e)))?;
        Ok(true)
    }

    fn import(&self, key: &ConfigKey, artifact: &Path) -> Result<()> {
        let contents = fs::read_to_string(artifact)
            .map_err(|e| TweakError::backup(format!("reading {}: {}", artifact.display(), e)))?;
        let parsed: ArtifactFile = serde_json::from_str(&contents)
            .map_err(|e| TweakError::backup(format!("corrupt artifact {}: {}", artifact.display(), e)))?;
        if parsed.key != *key {
            return Err(TweakError::backup(format!(
                "artifact {} describes {}, not {}",
                artifact.display(),
                parsed.key,
                key
            )));
        }
        self.store.import_subtree(key, &parsed.subtree)
    }

    fn peek_key(&self, artifact: &Path) -> Result<Option<ConfigKey>> {
        let contents = fs::read_to_string(artifact)
            .map_err(|e| TweakError::backup(format!("reading {}: {}", artifact.display(), e)))?;
        let parsed: ArtifactFile = serde_json::from_str(&contents)
            .map_err(|e| TweakError::backup(format!("corrupt artifact {}: {}", artifact.display(), e)))?;
        Ok(Some(parsed.key))
    }
}

/// Export mechanism that shells out to a privileged export/import tool.
///
/// Command templates expand `{key}` to the key's display form and `{file}`
/// to the artifact path. The tool's exit status is the only success signal;
/// it is known to write diagnostic noise to stderr even when it succeeds.
pub struct ExternalExport {
    export_cmd: Vec<String>,
    import_cmd: Vec<String>,
    /// Exit code the tool uses for "key does not exist", if it has one.
    not_found_exit: Option<i32>,
    timeout: Duration,
}

impl ExternalExport {
    pub fn new(export_cmd: Vec<String>, import_cmd: Vec<String>) -> Self {
        Self {
            export_cmd,
            import_cmd,
            not_found_exit: None,
            timeout: crate::runner::DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_not_found_exit(mut self, code: i32) -> Self {
        self.not_found_exit = Some(code);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn expand(template: &[String], key: &ConfigKey, file: &Path) -> Result<ToolInvocation> {
        let mut words = template.iter().map(|w| {
            w.replace("{key}", &key.to_string())
                .replace("{file}", &file.display().to_string())
        });
        let program = words
            .next()
            .ok_or_else(|| TweakError::backup("empty export/import command template"))?;
        Ok(ToolInvocation::new(program, words.collect()))
    }
}

impl ExportMechanism for ExternalExport {
    fn export(&self, key: &ConfigKey, _captured_at: DateTime<Utc>, dest: &Path) -> Result<bool> {
        let invocation = Self::expand(&self.export_cmd, key, dest)?.with_timeout(self.timeout);
        let output = run_tool(&invocation)?;
        if output.success {
            return Ok(true);
        }
        if self.not_found_exit.is_some() && output.exit_code == self.not_found_exit {
            return Ok(false);
        }
        Err(TweakError::backup(format!(
            "export of {} failed (exit {:?}): {}",
            key,
            output.exit_code,
            output.stderr.trim()
        )))
    }

    fn import(&self, key: &ConfigKey, artifact: &Path) -> Result<()> {
        let invocation = Self::expand(&self.import_cmd, key, artifact)?.with_timeout(self.timeout);
        let output = run_tool(&invocation)?;
        output.ensure_success(&format!("import of {}", key))
    }

    fn peek_key(&self, _artifact: &Path) -> Result<Option<ConfigKey>> {
        // Opaque tool-defined format; the file name is all we have.
        Ok(None)
    }
}

/// Timestamped artifact store over one backup directory.
pub struct BackupStore {
    dir: PathBuf,
    mechanism: Arc<dyn ExportMechanism>,
}

impl BackupStore {
    /// Open the store, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>, mechanism: Arc<dyn ExportMechanism>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, mechanism })
    }

    /// Capture the subtree at `key` into a fresh artifact.
    ///
    /// Returns `Ok(None)` with a WARNING when the key does not exist; this
    /// is normal control flow, and the key is never created by the attempt.
    pub fn capture(&self, ctx: &EngineContext, key: &ConfigKey) -> Result<Option<BackupHandle>> {
        let captured_at = Utc::now();
        let path = self.artifact_path(key, captured_at);
        if self.mechanism.export(key, captured_at, &path)? {
            ctx.info(format!("captured backup of {} -> {}", key, path.display()));
            Ok(Some(BackupHandle {
                key: key.clone(),
                captured_at,
                path,
            }))
        } else {
            ctx.warning(format!("{} does not exist, nothing to back up", key));
            Ok(None)
        }
    }

    /// Restore one specific artifact. Idempotent: re-importing the same
    /// artifact converges to the same end state.
    pub fn restore(&self, ctx: &EngineContext, handle: &BackupHandle) -> Result<()> {
        self.mechanism.import(&handle.key, &handle.path)?;
        ctx.success(format!(
            "restored {} from {}",
            handle.key,
            handle.path.display()
        ));
        Ok(())
    }

    /// Restore the most recently captured artifact for `key`.
    pub fn restore_latest(&self, ctx: &EngineContext, key: &ConfigKey) -> Result<RestoreOutcome> {
        let mut candidates = self.handles_for(key)?;
        candidates.sort_by(|a, b| a.captured_at.cmp(&b.captured_at));
        match candidates.pop() {
            Some(handle) => {
                self.restore(ctx, &handle)?;
                Ok(RestoreOutcome::Restored(handle))
            }
            None => Ok(RestoreOutcome::NoBackupFound),
        }
    }

    /// All artifacts in the directory, oldest first. With `key`, only that
    /// key's artifacts.
    pub fn list(&self, key: Option<&ConfigKey>) -> Result<Vec<BackupHandle>> {
        let mut handles = match key {
            Some(key) => self.handles_for(key)?,
            None => self.all_handles()?,
        };
        handles.sort_by(|a, b| a.captured_at.cmp(&b.captured_at));
        Ok(handles)
    }

    fn artifact_path(&self, key: &ConfigKey, captured_at: DateTime<Utc>) -> PathBuf {
        let stamp = captured_at.format(STAMP_FORMAT);
        self.dir
            .join(format!("{}-{}.json", stamp, key.sanitized_stem()))
    }

    fn handles_for(&self, key: &ConfigKey) -> Result<Vec<BackupHandle>> {
        let stem = key.sanitized_stem();
        let mut out = Vec::new();
        for (path, captured_at, file_stem) in self.scan()? {
            if file_stem != stem {
                continue;
            }
            // Sanitization can collide; trust the artifact over the file name
            // whenever the format records the key.
            match self.mechanism.peek_key(&path) {
                Ok(Some(recorded)) if recorded != *key => continue,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("skipping unreadable artifact {}: {}", path.display(), e);
                    continue;
                }
            }
            out.push(BackupHandle {
                key: key.clone(),
                captured_at,
                path,
            });
        }
        Ok(out)
    }

    fn all_handles(&self) -> Result<Vec<BackupHandle>> {
        let mut out = Vec::new();
        for (path, captured_at, _stem) in self.scan()? {
            match self.mechanism.peek_key(&path) {
                Ok(Some(key)) => out.push(BackupHandle {
                    key,
                    captured_at,
                    path,
                }),
                Ok(None) => log::debug!(
                    "artifact {} has an opaque format, not listed",
                    path.display()
                ),
                Err(e) => log::warn!("skipping unreadable artifact {}: {}", path.display(), e),
            }
        }
        Ok(out)
    }

    /// Parse `{stamp}-{stem}.json` names in the backup directory.
    fn scan(&self) -> Result<Vec<(PathBuf, DateTime<Utc>, String)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some((stamp, stem)) = name.split_once('-') else {
                continue;
            };
            let Ok(captured_at) = DateTime::parse_from_str(
                &format!("{} +0000", stamp),
                &format!("{} %z", STAMP_FORMAT),
            ) else {
                log::debug!("ignoring non-artifact file {}", path.display());
                continue;
            };
            let stem = stem.to_string();
            out.push((path, captured_at.with_timezone(&Utc), stem));
        }
        Ok(out)
    }
}

/// Exclusive lock over a backup directory for the duration of one apply or
/// undo run. Concurrent sessions racing the same directory would interleave
/// their artifacts and fight over the store, so the second session fails
/// fast instead.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
}

impl SessionLock {
    /// Acquire the lock, failing immediately if another session holds it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(TweakError::Locked(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to release session lock {}: {}", self.path.display(), e);
        }
    }
}
