//! Type-safe engine types for tweakctl
//!
//! This module replaces stringly-typed configuration with proper Rust enums
//! that provide compile-time validation and exhaustive matching.

// Library API - accessor helpers are consumed by downstream code
#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Tag describing the shape of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    #[strum(serialize = "integer")]
    Integer,
    #[strum(serialize = "text")]
    Text,
    #[strum(serialize = "binary")]
    Binary,
}

/// A tagged value as held by the configuration store.
///
/// Serializes as `{"kind": "integer", "data": 5}` so plan files and backup
/// artifacts stay readable and diffable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ConfigValue {
    Integer(i64),
    Text(String),
    Binary(Vec<u8>),
}

impl ConfigValue {
    /// Returns the kind tag for this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) => ValueKind::Integer,
            Self::Text(_) => ValueKind::Text,
            Self::Binary(_) => ValueKind::Binary,
        }
    }

    /// Integer payload, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "\"{}\"", s),
            // Binary payloads can be large; log length only
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// How a mutation step treats the pre-write backup.
///
/// `BestEffort` matches the historical behavior: a failed capture is logged
/// as a warning and the write proceeds. `Required` makes the capture a hard
/// precondition. `Skip` opts out entirely (caller already holds a backup or
/// the key is throwaway state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BackupPolicy {
    #[default]
    #[strum(serialize = "best_effort")]
    BestEffort,
    #[strum(serialize = "required")]
    Required,
    #[strum(serialize = "skip")]
    Skip,
}

impl BackupPolicy {
    /// Returns true if a capture should be attempted before the write.
    pub fn wants_backup(self) -> bool {
        !matches!(self, Self::Skip)
    }
}

/// Service startup mode used by compensating actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StartupMode {
    #[default]
    #[strum(serialize = "automatic")]
    Automatic,
    #[strum(serialize = "manual")]
    Manual,
    #[strum(serialize = "disabled")]
    Disabled,
}
