//! Tiers and mutation steps
//!
//! A tier is a named, independently toggleable group of mutation steps
//! representing one risk level. Steps inside a tier run strictly in order;
//! later steps may depend on the side effects of earlier ones, so nothing
//! here is reorderable.

// Library API - builders are consumed by embedding front ends
#![allow(dead_code)]

use crate::store::ConfigKey;
use crate::types::{BackupPolicy, ConfigValue};
use std::fmt;

/// The mutation a step performs against its target value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Set { value: ConfigValue },
    Remove,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set { value } => write!(f, "set {}", value),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// One desired write or removal.
#[derive(Debug, Clone)]
pub struct MutationStep {
    /// Human-readable label used in logs and the session report.
    pub label: String,
    pub target: ConfigKey,
    /// Value name inside the target key.
    pub name: String,
    pub action: StepAction,
    pub policy: BackupPolicy,
    /// A fatal step's failure aborts the run instead of continuing.
    pub fatal: bool,
    /// Optional guard name; an unmet guard skips the step.
    pub guard: Option<String>,
}

impl MutationStep {
    /// A step that writes `value` into `target\name`.
    pub fn set(
        label: impl Into<String>,
        target: ConfigKey,
        name: impl Into<String>,
        value: ConfigValue,
    ) -> Self {
        Self {
            label: label.into(),
            target,
            name: name.into(),
            action: StepAction::Set { value },
            policy: BackupPolicy::default(),
            fatal: false,
            guard: None,
        }
    }

    /// A step that removes `target\name`.
    pub fn remove(label: impl Into<String>, target: ConfigKey, name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target,
            name: name.into(),
            action: StepAction::Remove,
            policy: BackupPolicy::default(),
            fatal: false,
            guard: None,
        }
    }

    pub fn with_policy(mut self, policy: BackupPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Mark this step fatal: its failure aborts the tier and the run.
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

impl fmt::Display for MutationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}\\{}", self.label, self.action, self.target, self.name)
    }
}

/// A named, ordered, independently gated group of steps.
#[derive(Debug, Clone)]
pub struct Tier {
    pub name: String,
    /// Tiers are opt-in; a disabled tier is skipped whole.
    pub enabled: bool,
    pub steps: Vec<MutationStep>,
}

impl Tier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            steps: Vec::new(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn step(mut self, step: MutationStep) -> Self {
        self.steps.push(step);
        self
    }
}
