//! Synchronization point inserter
//!
//! A barrier follows every phase that creates resources, runs critical-path
//! operations, or runs a verb needing external approval. Wait targets are
//! recorded both as plain strings (`wait_for`) and as typed conditions.

use tracing::debug;

use crate::config::PlannerConfig;
use crate::resources::ResourcePlan;
use crate::types::{ExecutionPhase, OnTimeout, SyncCondition, SynchronizationPoint};

pub struct SyncInserter<'a> {
    config: &'a PlannerConfig,
}

impl<'a> SyncInserter<'a> {
    pub fn new(config: &'a PlannerConfig) -> Self {
        Self { config }
    }

    pub fn insert(
        &self,
        phases: &[ExecutionPhase],
        resources: &ResourcePlan,
    ) -> Vec<SynchronizationPoint> {
        let points: Vec<SynchronizationPoint> = phases
            .iter()
            .filter_map(|phase| self.point_after(phase, resources))
            .collect();

        debug!(points = points.len(), "Synchronization points inserted");
        points
    }

    fn point_after(
        &self,
        phase: &ExecutionPhase,
        resources: &ResourcePlan,
    ) -> Option<SynchronizationPoint> {
        let mut conditions: Vec<SyncCondition> = Vec::new();
        let mut push = |condition: SyncCondition| {
            if !conditions.contains(&condition) {
                conditions.push(condition);
            }
        };

        for op in &phase.operations {
            if let Some(dep) = resources
                .resource_for(&op.id)
                .and_then(|rt| resources.dependency(rt))
            {
                push(SyncCondition::ResourceCreated {
                    resource_type: dep.resource_type.clone(),
                    wait_condition: dep.wait_condition.clone(),
                });
            }
        }
        for op in phase.operations.iter().filter(|op| op.on_critical_path) {
            for attr in &op.produces {
                push(SyncCondition::AttributeReady {
                    attribute: attr.clone(),
                });
            }
        }
        for op in &phase.operations {
            if let Some(approver) = self
                .config
                .verb(&op.verb)
                .and_then(|spec| spec.approval.as_ref())
            {
                push(SyncCondition::ExternalApproval {
                    approver: approver.clone(),
                    operation_id: op.id.clone(),
                });
            }
        }

        let critical = phase.operations.iter().any(|op| op.on_critical_path);
        if conditions.is_empty() && !critical {
            return None;
        }

        let mut wait_for: Vec<String> = Vec::new();
        for target in conditions.iter().map(wait_target) {
            if !wait_for.contains(&target) {
                wait_for.push(target);
            }
        }

        Some(SynchronizationPoint {
            name: format!("sync-after-phase-{}", phase.ordinal),
            after_phase: phase.ordinal,
            wait_for,
            timeout_ms: self.config.scheduling.sync_timeout_ms,
            on_timeout: OnTimeout::Fail,
            critical,
            conditions,
        })
    }
}

fn wait_target(condition: &SyncCondition) -> String {
    match condition {
        SyncCondition::AttributeReady { attribute } => format!("attribute-ready:{}", attribute),
        SyncCondition::ResourceCreated {
            resource_type,
            wait_condition,
        } => wait_condition
            .clone()
            .unwrap_or_else(|| format!("resource-created:{}", resource_type)),
        SyncCondition::ExternalApproval { approver, .. } => format!("approval:{}", approver),
    }
}
