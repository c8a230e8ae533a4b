//! Error handling module for tweakctl
//!
//! Provides centralized error handling with proper error types using thiserror.
//! All errors in the engine should use these types for consistency. Absence of
//! a key or value is *not* an error anywhere in the engine; it is modeled as
//! `Option`/outcome enums and only the genuinely failing paths end up here.

#![allow(dead_code)] // Error variants and helpers are available for future use

use crate::store::ConfigKey;
use thiserror::Error;

/// Main error type for tweakctl
#[derive(Error, Debug)]
pub enum TweakError {
    /// IO errors (artifact files, store directories, lock file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store rejected a read or write (bad path, wrong type, corrupt entry)
    #[error("Store error: {0}")]
    Store(String),

    /// A privileged location refused the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The export/import mechanism failed to capture or restore a subtree
    #[error("Backup error: {0}")]
    Backup(String),

    /// A value write or removal failed
    #[error("Mutation failed: {0}")]
    Mutation(String),

    /// A step marked fatal failed; the current tier was aborted
    #[error("Fatal step '{step}' failed: {cause}")]
    FatalStep { step: String, cause: String },

    /// A backup was required by policy but could not be captured
    #[error("Backup required for {key} but capture failed: {cause}")]
    BackupRequired { key: ConfigKey, cause: String },

    /// Tweak plan file errors (loading, parsing, validation)
    #[error("Plan error: {0}")]
    Plan(String),

    /// Another session holds the backup directory lock
    #[error("Backup directory is locked by another session: {0}")]
    Locked(String),

    /// The run was cancelled between steps
    #[error("Cancelled")]
    Cancelled,

    /// External tool invocation errors (spawn failure, timeout, non-zero exit)
    #[error("Tool error: {0}")]
    Tool(String),
}

/// Result type alias for tweakctl operations
pub type Result<T> = std::result::Result<T, TweakError>;

// Convenient error constructors
impl TweakError {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a permission-denied error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a backup error
    pub fn backup(msg: impl Into<String>) -> Self {
        Self::Backup(msg.into())
    }

    /// Create a mutation error
    pub fn mutation(msg: impl Into<String>) -> Self {
        Self::Mutation(msg.into())
    }

    /// Create a plan error
    pub fn plan(msg: impl Into<String>) -> Self {
        Self::Plan(msg.into())
    }

    /// Create a tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Returns true if this failure should abort the surrounding tier
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalStep { .. } | Self::Cancelled)
    }
}
