//! Phase builder
//!
//! Levels operations over their dependency edges and groups each level into
//! an [`ExecutionPhase`]. Operation dependencies are the union of
//!
//! - attribute producer → consumer edges,
//! - verb ordering rules against earlier operations in the source,
//! - resource prerequisite edges (producer of a prerequisite → creator).
//!
//! The attribute graph has already been checked for cycles; a cycle that
//! only appears once verb rules and resource prerequisites are added is a
//! phase construction error.

pub mod leveling;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::config::PlannerConfig;
use crate::error::{PlanError, PlanResult};
use crate::resources::ResourcePlan;
use crate::timing::phase_duration;
use crate::types::{
    AttributeEdge, ExecutionContext, ExecutionPhase, FailureStrategy, Operation, ParallelGroup,
};

use leveling::{compute_levels, group_by_level};

pub const HINT_PARALLEL: &str = "parallel-execution";
pub const HINT_EXCLUSIVE_SERIALIZED: &str = "exclusive-resource-serialized";
pub const HINT_CRITICAL_PATH: &str = "critical-path";
pub const HINT_RESOURCE_CREATION: &str = "resource-creation";
pub const HINT_DOMAIN_SUBGROUPS: &str = "domain-subgrouping";

pub struct Scheduler<'a> {
    config: &'a PlannerConfig,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a PlannerConfig) -> Self {
        Self { config }
    }

    /// Predecessor indices for every operation
    pub fn operation_dependencies(
        &self,
        operations: &[Operation],
        edges: &[AttributeEdge],
        resources: &ResourcePlan,
    ) -> Vec<BTreeSet<usize>> {
        let index: HashMap<&str, usize> = operations
            .iter()
            .enumerate()
            .map(|(i, op)| (op.id.as_str(), i))
            .collect();
        let mut preds = vec![BTreeSet::new(); operations.len()];

        let mut link = |from: &str, to: &str| {
            if let (Some(&f), Some(&t)) = (index.get(from), index.get(to)) {
                if f != t {
                    preds[t].insert(f);
                }
            }
        };

        for edge in edges {
            link(&edge.from_operation, &edge.to_operation);
        }

        for (later, op) in operations.iter().enumerate() {
            let Some(spec) = self.config.verb(&op.verb) else {
                continue;
            };
            for earlier in &operations[..later] {
                if spec.depends_on.iter().any(|v| v == &earlier.verb) {
                    link(&earlier.id, &op.id);
                }
            }
        }

        for (producer, creator) in resources.prerequisite_edges(operations) {
            link(&producer, &creator);
        }

        preds
    }

    /// Build contiguous phases from operations and their dependencies
    pub fn build_phases(
        &self,
        operations: &[Operation],
        edges: &[AttributeEdge],
        resources: &ResourcePlan,
        session_id: &str,
        trace_id: &str,
    ) -> PlanResult<Vec<ExecutionPhase>> {
        let preds = self.operation_dependencies(operations, edges, resources);
        let deps: Vec<Vec<usize>> = preds.iter().map(|p| p.iter().copied().collect()).collect();

        let levels = compute_levels(&deps).map_err(|cycle| {
            let ids: Vec<&str> = cycle
                .members
                .iter()
                .map(|&i| operations[i].id.as_str())
                .collect();
            PlanError::phase(format!(
                "operation dependencies form a cycle: {}",
                ids.join(" -> ")
            ))
        })?;

        verify_ordering(operations, &deps, &levels)?;

        let strength = incident_strength(operations, edges);
        let groups = group_by_level(&levels);
        let mut phases = Vec::with_capacity(groups.len());

        for (ordinal, mut members) in groups.into_iter().enumerate() {
            if members.is_empty() {
                return Err(PlanError::phase(format!("level {} has no operations", ordinal)));
            }

            members.sort_by(|&a, &b| {
                let (oa, ob) = (&operations[a], &operations[b]);
                ob.priority
                    .cmp(&oa.priority)
                    .then_with(|| strength[b].cmp(&strength[a]))
                    .then_with(|| oa.line.cmp(&ob.line))
            });

            let dependencies: Vec<usize> = members
                .iter()
                .flat_map(|&m| deps[m].iter().map(|&p| levels[p]))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let ops: Vec<Operation> = members.iter().map(|&m| operations[m].clone()).collect();
            phases.push(self.phase(ordinal, ops, dependencies, resources, session_id, trace_id));
        }

        debug!(
            session_id,
            phases = phases.len(),
            operations = operations.len(),
            "Phases built"
        );
        Ok(phases)
    }

    fn phase(
        &self,
        ordinal: usize,
        operations: Vec<Operation>,
        dependencies: Vec<usize>,
        resources: &ResourcePlan,
        session_id: &str,
        trace_id: &str,
    ) -> ExecutionPhase {
        let any_exclusive = operations.iter().any(|op| resources.is_exclusive(&op.id));
        let parallelizable = operations.len() >= 2 && !any_exclusive;
        let estimated_duration_ms = phase_duration(&operations, parallelizable);

        let mut resources_needed: Vec<String> = Vec::new();
        let mut wait_conditions: Vec<String> = Vec::new();
        for op in &operations {
            let Some(resource_type) = resources.resource_for(&op.id) else {
                continue;
            };
            if !resources_needed.iter().any(|r| r == resource_type) {
                resources_needed.push(resource_type.to_string());
                if let Some(dep) = resources.dependency(resource_type) {
                    wait_conditions.push(dep.wait_target());
                }
            }
        }

        let parallel_groups = if parallelizable {
            parallel_groups(ordinal, &operations)
        } else {
            vec![]
        };

        let mut hints = Vec::new();
        if parallelizable {
            hints.push(HINT_PARALLEL);
        } else if operations.len() >= 2 && any_exclusive {
            hints.push(HINT_EXCLUSIVE_SERIALIZED);
        }
        if parallel_groups.len() > 1 {
            hints.push(HINT_DOMAIN_SUBGROUPS);
        }
        if operations.iter().any(|op| op.on_critical_path) {
            hints.push(HINT_CRITICAL_PATH);
        }
        if !resources_needed.is_empty() {
            hints.push(HINT_RESOURCE_CREATION);
        }

        let all_retryable = operations.iter().all(|op| op.retryable);
        let failure_strategy = if !resources_needed.is_empty() {
            FailureStrategy::Rollback
        } else if all_retryable {
            FailureStrategy::Retry
        } else {
            FailureStrategy::FailFast
        };
        let max_retries = if all_retryable {
            self.config.recovery.max_retries
        } else {
            0
        };

        let scheduling = &self.config.scheduling;
        let timeout_ms = scheduling.phase_timeout_floor_ms.max(
            estimated_duration_ms.saturating_mul(scheduling.phase_timeout_multiplier),
        );

        ExecutionPhase {
            ordinal,
            operations,
            dependencies,
            parallelizable,
            estimated_duration_ms,
            resources_needed,
            wait_conditions,
            optimization_hints: hints.into_iter().map(String::from).collect(),
            failure_strategy,
            max_retries,
            timeout_ms,
            execution_context: ExecutionContext {
                session_id: session_id.to_string(),
                trace_id: trace_id.to_string(),
                parallel_groups,
            },
        }
    }
}

/// Every predecessor must sit on a strictly lower level
fn verify_ordering(operations: &[Operation], deps: &[Vec<usize>], levels: &[usize]) -> PlanResult<()> {
    for (idx, preds) in deps.iter().enumerate() {
        for &pred in preds {
            if levels[pred] >= levels[idx] {
                return Err(PlanError::phase(format!(
                    "{} (level {}) is not after its predecessor {} (level {})",
                    operations[idx].id, levels[idx], operations[pred].id, levels[pred]
                )));
            }
        }
    }
    Ok(())
}

/// Strongest edge touching each operation, 0 when it has none
fn incident_strength(operations: &[Operation], edges: &[AttributeEdge]) -> Vec<u8> {
    let mut by_id: HashMap<&str, u8> = HashMap::new();
    for edge in edges {
        for id in [edge.from_operation.as_str(), edge.to_operation.as_str()] {
            let entry = by_id.entry(id).or_insert(0);
            *entry = (*entry).max(edge.strength);
        }
    }
    operations
        .iter()
        .map(|op| by_id.get(op.id.as_str()).copied().unwrap_or(0))
        .collect()
}

/// Parallel-safe operations grouped by domain; others run alone
fn parallel_groups(ordinal: usize, operations: &[Operation]) -> Vec<ParallelGroup> {
    let mut by_domain: BTreeMap<&str, usize> = BTreeMap::new();
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for op in operations {
        if op.parallel_safe {
            match by_domain.get(op.domain.as_str()) {
                Some(&g) => groups[g].1.push(op.id.clone()),
                None => {
                    by_domain.insert(op.domain.as_str(), groups.len());
                    groups.push((op.domain.clone(), vec![op.id.clone()]));
                }
            }
        } else {
            groups.push((op.domain.clone(), vec![op.id.clone()]));
        }
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(n, (domain, operation_ids))| ParallelGroup {
            group_id: format!("phase-{}-group-{}", ordinal, n + 1),
            domain,
            operation_ids,
        })
        .collect()
}
