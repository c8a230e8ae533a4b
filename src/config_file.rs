//! Tweak plan files
//!
//! A plan file is the serialized form of one optimization module: its tiers
//! of mutation steps, the static key list undo restores from, the
//! compensating actions undo performs, and the checks the verification pass
//! re-reads. Plans are plain JSON so they can be reviewed and diffed before
//! anything touches the system.
//!
//! The undo key list is deliberately independent of the tiers: undo must
//! work even when the plan's steps changed between apply and undo, so it
//! never tries to re-derive keys from step definitions.

// Library API - plan saving is used by plan-authoring tooling
#![allow(dead_code)]

use crate::error::{Result, TweakError};
use crate::rollback::CompensatingAction;
use crate::store::ConfigKey;
use crate::tier::{MutationStep, StepAction, Tier};
use crate::types::{BackupPolicy, ConfigValue};
use crate::verify::VerifyCheck;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use strum::{Display, EnumString};

/// What a step does to its target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    #[strum(serialize = "set")]
    Set,
    #[strum(serialize = "remove")]
    Remove,
}

/// One step as written in a plan file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub label: String,
    /// Target key, e.g. `system\Power\Throttling`.
    pub key: String,
    /// Value name inside the target key.
    pub name: String,
    #[serde(default)]
    pub action: ActionKind,
    /// Required for `set`, forbidden for `remove`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConfigValue>,
    #[serde(default)]
    pub backup: BackupPolicy,
    #[serde(default)]
    pub fatal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

/// One tier as written in a plan file. Tiers default to disabled: applying
/// a tier is an explicit opt-in, in the file or on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub steps: Vec<StepSpec>,
}

/// One verification check as written in a plan file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySpec {
    pub label: String,
    pub key: String,
    pub name: String,
    pub expect: ConfigValue,
}

/// A complete tweak plan for one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweakPlan {
    /// Module name, used in logs and lock diagnostics.
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tiers: Vec<TierSpec>,
    /// Static key list undo restores from.
    #[serde(default)]
    pub undo_keys: Vec<String>,
    #[serde(default)]
    pub compensating: Vec<CompensatingAction>,
    #[serde(default)]
    pub verify: Vec<VerifySpec>,
}

impl TweakPlan {
    /// Load a plan from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            TweakError::plan(format!(
                "failed to read plan {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let plan: Self = serde_json::from_str(&contents).map_err(|e| {
            TweakError::plan(format!(
                "failed to parse plan {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(plan)
    }

    /// Save a plan to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| {
            TweakError::plan(format!(
                "failed to write plan {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Validate the plan without building anything: module name, key
    /// syntax, set/remove value shape, guard names, duplicate tiers.
    pub fn validate(&self, known_guards: &[&str]) -> Result<()> {
        if self.module.trim().is_empty() {
            return Err(TweakError::plan("module name must not be empty"));
        }

        let mut tier_names = HashSet::new();
        for tier in &self.tiers {
            if !tier_names.insert(tier.name.as_str()) {
                return Err(TweakError::plan(format!(
                    "duplicate tier name '{}'",
                    tier.name
                )));
            }
            for step in &tier.steps {
                step.validate(&tier.name, known_guards)?;
            }
        }

        for key in &self.undo_keys {
            key.parse::<ConfigKey>().map_err(|e| {
                TweakError::plan(format!("bad undo key '{}': {}", key, e))
            })?;
        }

        for check in &self.verify {
            check.key.parse::<ConfigKey>().map_err(|e| {
                TweakError::plan(format!("bad verify key '{}': {}", check.key, e))
            })?;
        }

        Ok(())
    }

    /// Build runnable tiers. `selected` narrows enablement from the command
    /// line: when non-empty, exactly the named tiers are enabled and
    /// everything else is disabled, overriding the file.
    pub fn to_tiers(&self, selected: &[String]) -> Result<Vec<Tier>> {
        for name in selected {
            if !self.tiers.iter().any(|t| &t.name == name) {
                return Err(TweakError::plan(format!(
                    "plan '{}' has no tier named '{}'",
                    self.module, name
                )));
            }
        }

        let mut tiers = Vec::with_capacity(self.tiers.len());
        for spec in &self.tiers {
            let enabled = if selected.is_empty() {
                spec.enabled
            } else {
                selected.iter().any(|n| n == &spec.name)
            };
            let mut tier = Tier::new(&spec.name).enabled(enabled);
            for step in &spec.steps {
                tier = tier.step(step.to_step()?);
            }
            tiers.push(tier);
        }
        Ok(tiers)
    }

    /// Parse the static undo key list.
    pub fn undo_keys(&self) -> Result<Vec<ConfigKey>> {
        self.undo_keys.iter().map(|k| k.parse()).collect()
    }

    /// Build the verification checks.
    pub fn verify_checks(&self) -> Result<Vec<VerifyCheck>> {
        self.verify
            .iter()
            .map(|spec| {
                Ok(VerifyCheck {
                    label: spec.label.clone(),
                    key: spec.key.parse()?,
                    name: spec.name.clone(),
                    expect: spec.expect.clone(),
                })
            })
            .collect()
    }
}

impl StepSpec {
    fn validate(&self, tier: &str, known_guards: &[&str]) -> Result<()> {
        self.key.parse::<ConfigKey>().map_err(|e| {
            TweakError::plan(format!(
                "tier '{}', step '{}': bad key '{}': {}",
                tier, self.label, self.key, e
            ))
        })?;
        match self.action {
            ActionKind::Set if self.value.is_none() => {
                return Err(TweakError::plan(format!(
                    "tier '{}', step '{}': set action requires a value",
                    tier, self.label
                )));
            }
            ActionKind::Remove if self.value.is_some() => {
                return Err(TweakError::plan(format!(
                    "tier '{}', step '{}': remove action takes no value",
                    tier, self.label
                )));
            }
            _ => {}
        }
        if let Some(guard) = &self.guard {
            if !known_guards.contains(&guard.as_str()) {
                return Err(TweakError::plan(format!(
                    "tier '{}', step '{}': unknown guard '{}'",
                    tier, self.label, guard
                )));
            }
        }
        Ok(())
    }

    fn to_step(&self) -> Result<MutationStep> {
        let target: ConfigKey = self.key.parse()?;
        let action = match self.action {
            ActionKind::Set => StepAction::Set {
                value: self
                    .value
                    .clone()
                    .ok_or_else(|| {
                        TweakError::plan(format!("step '{}': set without value", self.label))
                    })?,
            },
            ActionKind::Remove => StepAction::Remove,
        };
        Ok(MutationStep {
            label: self.label.clone(),
            target,
            name: self.name.clone(),
            action,
            policy: self.backup,
            fatal: self.fatal,
            guard: self.guard.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "module": "power",
        "description": "Power management tweaks",
        "tiers": [
            {
                "name": "safe",
                "enabled": true,
                "steps": [
                    {
                        "label": "disable throttling",
                        "key": "system\\Power\\Throttling",
                        "name": "Enabled",
                        "value": {"kind": "integer", "data": 0}
                    },
                    {
                        "label": "drop legacy flag",
                        "key": "boot\\Flags",
                        "name": "LegacyPower",
                        "action": "remove",
                        "guard": "uefi"
                    }
                ]
            },
            {
                "name": "aggressive",
                "steps": [
                    {
                        "label": "max performance plan",
                        "key": "system\\Power\\Plan",
                        "name": "Mode",
                        "value": {"kind": "text", "data": "performance"},
                        "backup": "required",
                        "fatal": true
                    }
                ]
            }
        ],
        "undo_keys": ["system\\Power\\Throttling", "system\\Power\\Plan", "boot\\Flags"],
        "compensating": [
            {"kind": "service", "service": "thermald", "startup": "automatic", "start": true}
        ],
        "verify": [
            {
                "label": "throttling disabled",
                "key": "system\\Power\\Throttling",
                "name": "Enabled",
                "expect": {"kind": "integer", "data": 0}
            }
        ]
    }"#;

    const GUARDS: &[&str] = &["uefi", "bios", "elevated", "intel_cpu", "amd_cpu"];

    #[test]
    fn test_parse_and_validate_sample() {
        let plan: TweakPlan = serde_json::from_str(SAMPLE).unwrap();
        plan.validate(GUARDS).unwrap();
        assert_eq!(plan.module, "power");
        assert_eq!(plan.tiers.len(), 2);
        assert_eq!(plan.undo_keys.len(), 3);
        assert_eq!(plan.compensating.len(), 1);
    }

    #[test]
    fn test_to_tiers_respects_file_enablement() {
        let plan: TweakPlan = serde_json::from_str(SAMPLE).unwrap();
        let tiers = plan.to_tiers(&[]).unwrap();
        assert!(tiers[0].enabled);
        // The aggressive tier never opted in
        assert!(!tiers[1].enabled);
    }

    #[test]
    fn test_tier_selection_overrides_file() {
        let plan: TweakPlan = serde_json::from_str(SAMPLE).unwrap();
        let tiers = plan.to_tiers(&["aggressive".to_string()]).unwrap();
        assert!(!tiers[0].enabled);
        assert!(tiers[1].enabled);
    }

    #[test]
    fn test_unknown_tier_selection_fails() {
        let plan: TweakPlan = serde_json::from_str(SAMPLE).unwrap();
        assert!(plan.to_tiers(&["nope".to_string()]).is_err());
    }

    #[test]
    fn test_set_without_value_rejected() {
        let plan: TweakPlan = serde_json::from_str(
            r#"{
                "module": "m",
                "tiers": [{"name": "t", "steps": [
                    {"label": "broken", "key": "system\\A", "name": "X"}
                ]}]
            }"#,
        )
        .unwrap();
        let err = plan.validate(GUARDS).unwrap_err();
        assert!(err.to_string().contains("requires a value"));
    }

    #[test]
    fn test_unknown_guard_rejected() {
        let plan: TweakPlan = serde_json::from_str(
            r#"{
                "module": "m",
                "tiers": [{"name": "t", "steps": [
                    {"label": "s", "key": "system\\A", "name": "X",
                     "value": {"kind": "integer", "data": 1}, "guard": "has_rgb"}
                ]}]
            }"#,
        )
        .unwrap();
        let err = plan.validate(GUARDS).unwrap_err();
        assert!(err.to_string().contains("unknown guard"));
    }

    #[test]
    fn test_bad_undo_key_rejected() {
        let plan: TweakPlan = serde_json::from_str(
            r#"{"module": "m", "tiers": [], "undo_keys": ["junkroot\\A"]}"#,
        )
        .unwrap();
        assert!(plan.validate(GUARDS).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let plan: TweakPlan = serde_json::from_str(SAMPLE).unwrap();
        plan.save_to_file(&path).unwrap();

        let loaded = TweakPlan::load_from_file(&path).unwrap();
        assert_eq!(loaded.module, plan.module);
        assert_eq!(loaded.tiers.len(), plan.tiers.len());
        loaded.validate(GUARDS).unwrap();
    }
}
