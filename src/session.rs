//! Session reporting
//!
//! One apply run over an ordered list of tiers is a session. The session
//! records every step outcome and aggregates per-tier counts for whatever
//! front end wants to render a pass/fail summary; the engine itself never
//! formats beyond the plain-text `summary` used by the CLI.
//!
//! Sessions are audit artifacts only: undo never consults them. Which keys
//! to restore comes from the plan's static key list.

#![allow(dead_code)] // Report accessors are available for UI consumers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator state over the course of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running { tier: usize, step: usize },
    Completed,
    CompletedWithErrors,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Running { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running { tier, step } => write!(f, "running (tier {}, step {})", tier, step),
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithErrors => write!(f, "completed with errors"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Applied,
    Failed { cause: String },
    /// Guard predicate evaluated false; neither success nor failure.
    SkippedGuard,
    /// Dry-run mode; the write was logged, not performed.
    SkippedDryRun,
}

/// Outcome of one step, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub tier: String,
    pub step: String,
    #[serde(flatten)]
    pub status: StepStatus,
}

/// Aggregate counts for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierReport {
    pub name: String,
    pub enabled: bool,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl TierReport {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            succeeded: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

/// Structured result of one apply session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub state: SessionState,
    pub tiers: Vec<TierReport>,
    pub outcomes: Vec<StepOutcome>,
    /// Why the session aborted, when it did.
    pub abort_cause: Option<String>,
}

impl SessionReport {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            tiers: Vec::new(),
            outcomes: Vec::new(),
            abort_cause: None,
        }
    }

    /// Record a step outcome under the current (last) tier.
    pub fn record(&mut self, tier: &str, step: &str, status: StepStatus) {
        if let Some(report) = self.tiers.last_mut() {
            debug_assert_eq!(report.name, tier);
            match &status {
                StepStatus::Applied => report.succeeded += 1,
                StepStatus::Failed { .. } => report.failed += 1,
                StepStatus::SkippedGuard | StepStatus::SkippedDryRun => report.skipped += 1,
            }
        }
        self.outcomes.push(StepOutcome {
            tier: tier.to_string(),
            step: step.to_string(),
            status,
        });
    }

    /// Session-wide (succeeded, failed, skipped) totals.
    pub fn totals(&self) -> (usize, usize, usize) {
        self.tiers.iter().fold((0, 0, 0), |(s, f, k), t| {
            (s + t.succeeded, f + t.failed, k + t.skipped)
        })
    }

    /// Returns a plain-text summary of the session for logging/display.
    pub fn summary(&self) -> String {
        let (succeeded, failed, skipped) = self.totals();
        let mut lines = vec![
            format!("Session {}", self.state),
            format!(
                "  Totals: {} applied, {} failed, {} skipped",
                succeeded, failed, skipped
            ),
        ];
        if let Some(cause) = &self.abort_cause {
            lines.push(format!("  Abort cause: {}", cause));
        }
        for tier in &self.tiers {
            if tier.enabled {
                lines.push(format!(
                    "  {}: {} applied, {} failed, {} skipped",
                    tier.name, tier.succeeded, tier.failed, tier.skipped
                ));
            } else {
                lines.push(format!("  {}: disabled", tier.name));
            }
        }
        lines.join("\n")
    }
}

impl Default for SessionReport {
    fn default() -> Self {
        Self::new()
    }
}
