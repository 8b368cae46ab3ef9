//! Failure recovery planner
//!
//! The plan only describes compensation; the downstream executor runs it.
//! Every resource-creating operation gets a DELETE step, last created first.

use crate::config::PlannerConfig;
use crate::resources::ResourcePlan;
use crate::types::{
    ExecutionPhase, FailureRecoveryPlan, RecoveryStrategy, RollbackAction, RollbackCondition,
    RollbackStep,
};

pub struct RecoveryPlanner<'a> {
    config: &'a PlannerConfig,
}

impl<'a> RecoveryPlanner<'a> {
    pub fn new(config: &'a PlannerConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, phases: &[ExecutionPhase], resources: &ResourcePlan) -> FailureRecoveryPlan {
        let mut rollback_steps: Vec<RollbackStep> = phases
            .iter()
            .flat_map(|phase| {
                phase.operations.iter().filter_map(move |op| {
                    resources
                        .resource_for(&op.id)
                        .map(|resource_type| RollbackStep {
                            step_id: format!("rollback-{}", op.id),
                            operation_id: op.id.clone(),
                            resource_type: resource_type.to_string(),
                            phase: phase.ordinal,
                            action: RollbackAction::Delete,
                            condition: RollbackCondition::OnFailure,
                        })
                })
            })
            .collect();
        rollback_steps.reverse();

        let recovery = &self.config.recovery;
        FailureRecoveryPlan {
            strategy: RecoveryStrategy::Rollback,
            rollback_steps,
            max_retries: recovery.max_retries,
            retry_delay_ms: recovery.retry_delay_ms,
            notification_targets: recovery.notification_targets.clone(),
        }
    }
}
