//! Tier orchestration
//!
//! Walks an ordered list of tiers and drives each step through the mutator,
//! isolating failures per step: a failed write is logged, counted and the
//! tier moves on. Only two things stop a run early (a step explicitly
//! marked fatal, and cancellation) and neither triggers any automatic
//! compensating rollback. Whatever was applied stays applied until an
//! explicit undo.
//!
//! Execution is strictly sequential. Later steps may depend on the side
//! effects of earlier ones in the same tier (a removal can assume an earlier
//! write already landed), so there is no reordering and no parallelism.
//! Cancellation is cooperative and only observed between steps, never
//! mid-write.

use crate::context::EngineContext;
use crate::guards::GuardRegistry;
use crate::mutator::Mutator;
use crate::session::{SessionReport, SessionState, StepStatus, TierReport};
use crate::tier::{MutationStep, StepAction, Tier};

/// Runs tiers of mutation steps and aggregates their outcomes.
pub struct TierOrchestrator<'a> {
    mutator: &'a Mutator,
    guards: &'a GuardRegistry,
}

impl<'a> TierOrchestrator<'a> {
    pub fn new(mutator: &'a Mutator, guards: &'a GuardRegistry) -> Self {
        Self { mutator, guards }
    }

    /// Apply `tiers` in order and return the session report.
    ///
    /// The report always comes back, aborted or not; infrastructure errors
    /// that would prevent even producing a report do not exist at this
    /// layer (they belong to store/backup construction).
    pub fn run(&self, ctx: &EngineContext, tiers: &[Tier]) -> SessionReport {
        let mut report = SessionReport::new();

        for (tier_index, tier) in tiers.iter().enumerate() {
            report.tiers.push(TierReport::new(&tier.name, tier.enabled));

            if !tier.enabled {
                ctx.info(format!("tier '{}' is disabled, skipping", tier.name));
                continue;
            }
            ctx.info(format!(
                "tier '{}': {} steps",
                tier.name,
                tier.steps.len()
            ));

            for (step_index, step) in tier.steps.iter().enumerate() {
                if ctx.cancel.is_cancelled() {
                    ctx.warning("cancellation requested, stopping before next step");
                    report.state = SessionState::Aborted;
                    report.abort_cause = Some("cancelled".to_string());
                    return report;
                }
                report.state = SessionState::Running {
                    tier: tier_index,
                    step: step_index,
                };

                match self.run_step(ctx, step) {
                    StepStatus::Failed { cause } if step.fatal => {
                        ctx.error(format!(
                            "fatal step '{}' failed, aborting: {}",
                            step.label, cause
                        ));
                        report.record(&tier.name, &step.label, StepStatus::Failed { cause: cause.clone() });
                        report.state = SessionState::Aborted;
                        report.abort_cause =
                            Some(format!("fatal step '{}': {}", step.label, cause));
                        return report;
                    }
                    status => report.record(&tier.name, &step.label, status),
                }
            }
        }

        let (_, failed, _) = report.totals();
        report.state = if failed > 0 {
            SessionState::CompletedWithErrors
        } else {
            SessionState::Completed
        };
        report
    }

    fn run_step(&self, ctx: &EngineContext, step: &MutationStep) -> StepStatus {
        if let Some(guard_name) = &step.guard {
            match self.guards.get(guard_name) {
                Some(guard) => {
                    if !guard() {
                        // A guard miss is a precondition not holding, never a failure
                        ctx.info(format!(
                            "step '{}' skipped: guard '{}' not met",
                            step.label, guard_name
                        ));
                        return StepStatus::SkippedGuard;
                    }
                }
                None => {
                    // Plan validation normally catches this; defend anyway
                    let cause = format!("unknown guard '{}'", guard_name);
                    ctx.error(format!("step '{}' failed: {}", step.label, cause));
                    return StepStatus::Failed { cause };
                }
            }
        }

        if ctx.dry_run {
            ctx.info(format!("dry-run: would {}", step));
            return StepStatus::SkippedDryRun;
        }

        let result = match &step.action {
            StepAction::Set { value } => self.mutator.set_value(
                ctx,
                &step.target,
                &step.name,
                value.clone(),
                step.policy,
            ),
            StepAction::Remove => {
                self.mutator
                    .remove_value(ctx, &step.target, &step.name, step.policy)
            }
        };

        match result {
            Ok(()) => {
                ctx.success(format!("{}", step));
                StepStatus::Applied
            }
            Err(e) => {
                let cause = e.to_string();
                ctx.error(format!("step '{}' failed: {}", step.label, cause));
                StepStatus::Failed { cause }
            }
        }
    }
}
