//! Timing estimator and optimization metrics
//!
//! Durations come from the configuration: verb lookup (or the default) plus
//! the domain overhead. Parallel phases cost their slowest member, sequential
//! phases the sum of their members. The naive baseline charges every
//! operation `sequential_baseline_ms`.

use crate::config::PlannerConfig;
use crate::types::{ExecutionPhase, OptimizationMetrics, Operation};

pub const OPT_DEPENDENCY_LEVELING: &str = "dependency-leveling";
pub const OPT_PARALLEL_PHASES: &str = "parallel-phase-grouping";
pub const OPT_DOMAIN_SUBGROUPS: &str = "domain-subgrouping";
pub const OPT_CRITICAL_PATH: &str = "critical-path-analysis";
pub const OPT_SYNC_BARRIERS: &str = "synchronization-barriers";
pub const OPT_RESOURCE_ORDERING: &str = "resource-ordering";
pub const OPT_EXCLUSIVE_SERIALIZATION: &str = "exclusive-access-serialization";

/// Duration of a phase holding `operations`
pub fn phase_duration(operations: &[Operation], parallel: bool) -> u64 {
    let durations = operations.iter().map(|op| op.estimated_duration_ms);
    if parallel {
        durations.max().unwrap_or(0)
    } else {
        durations.sum()
    }
}

/// What the compiler observed while building the plan, for metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanShape {
    pub critical_path_length: usize,
    pub synchronization_points: usize,
    pub resource_types: usize,
}

pub struct TimingEstimator<'a> {
    config: &'a PlannerConfig,
}

impl<'a> TimingEstimator<'a> {
    pub fn new(config: &'a PlannerConfig) -> Self {
        Self { config }
    }

    pub fn operation_duration(&self, verb: &str) -> u64 {
        self.config.operation_duration(verb)
    }

    pub fn total_duration(&self, phases: &[ExecutionPhase]) -> u64 {
        phases.iter().map(|p| p.estimated_duration_ms).sum()
    }

    pub fn sequential_baseline(&self, operation_count: usize) -> u64 {
        (operation_count as u64).saturating_mul(self.config.timing.sequential_baseline_ms)
    }

    pub fn metrics(&self, phases: &[ExecutionPhase], shape: PlanShape) -> OptimizationMetrics {
        let operation_count: usize = phases.iter().map(|p| p.operations.len()).sum();
        let original = self.sequential_baseline(operation_count);
        let optimized = self.total_duration(phases);
        let improvement = original.saturating_sub(optimized);
        let improvement_percent = if original == 0 {
            0.0
        } else {
            improvement as f64 / original as f64 * 100.0
        };

        let (parallel, sequential): (Vec<&ExecutionPhase>, Vec<&ExecutionPhase>) =
            phases.iter().partition(|p| p.parallelizable);
        let parallel_operations = parallel.iter().map(|p| p.operations.len()).sum();
        let sequential_operations = sequential.iter().map(|p| p.operations.len()).sum();

        let mut applied = Vec::new();
        if phases.len() > 1 {
            applied.push(OPT_DEPENDENCY_LEVELING);
        }
        if !parallel.is_empty() {
            applied.push(OPT_PARALLEL_PHASES);
        }
        if parallel
            .iter()
            .any(|p| p.execution_context.parallel_groups.len() > 1)
        {
            applied.push(OPT_DOMAIN_SUBGROUPS);
        }
        if shape.critical_path_length > 0 {
            applied.push(OPT_CRITICAL_PATH);
        }
        if shape.synchronization_points > 0 {
            applied.push(OPT_SYNC_BARRIERS);
        }
        if shape.resource_types > 1 {
            applied.push(OPT_RESOURCE_ORDERING);
        }
        if phases.iter().any(|p| {
            p.optimization_hints
                .iter()
                .any(|h| h == crate::scheduler::HINT_EXCLUSIVE_SERIALIZED)
        }) {
            applied.push(OPT_EXCLUSIVE_SERIALIZATION);
        }

        OptimizationMetrics {
            original_duration_ms: original,
            optimized_duration_ms: optimized,
            improvement_ms: improvement,
            improvement_percent,
            parallel_operations,
            sequential_operations,
            parallel_phases: parallel.len(),
            sequential_phases: sequential.len(),
            critical_path_length: shape.critical_path_length,
            optimizations_applied: applied.into_iter().map(String::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::op;
    use crate::types::{ExecutionContext, FailureStrategy};

    fn phase(ordinal: usize, ops: Vec<Operation>, parallel: bool) -> ExecutionPhase {
        ExecutionPhase {
            ordinal,
            estimated_duration_ms: phase_duration(&ops, parallel),
            operations: ops,
            dependencies: vec![],
            parallelizable: parallel,
            resources_needed: vec![],
            wait_conditions: vec![],
            optimization_hints: vec![],
            failure_strategy: FailureStrategy::Retry,
            max_retries: 3,
            timeout_ms: 30_000,
            execution_context: ExecutionContext {
                session_id: "s".into(),
                trace_id: "t".into(),
                parallel_groups: vec![],
            },
        }
    }

    fn timed(id: &str, ms: u64) -> Operation {
        let mut o = op(id, "a.x", &[], &[]);
        o.estimated_duration_ms = ms;
        o
    }

    #[test]
    fn test_phase_duration_rules() {
        let ops = vec![timed("op-1", 500), timed("op-2", 1_500)];
        assert_eq!(phase_duration(&ops, true), 1_500);
        assert_eq!(phase_duration(&ops, false), 2_000);
        assert_eq!(phase_duration(&[], true), 0);
    }

    #[test]
    fn test_operation_duration_includes_overhead() {
        let config = PlannerConfig::default();
        let timing = TimingEstimator::new(&config);
        assert_eq!(
            timing.operation_duration("kyc.collect"),
            1_500 + config.domain("kyc").overhead_ms
        );
        assert_eq!(
            timing.operation_duration("mystery.thing"),
            config.timing.default_verb_ms + config.default_domain.overhead_ms
        );
    }

    #[test]
    fn test_metrics_against_baseline() {
        let config = PlannerConfig::default();
        let timing = TimingEstimator::new(&config);
        let phases = vec![
            phase(0, vec![timed("op-1", 1_000), timed("op-2", 2_000)], true),
            phase(1, vec![timed("op-3", 1_000)], false),
        ];
        let metrics = timing.metrics(
            &phases,
            PlanShape {
                critical_path_length: 2,
                ..PlanShape::default()
            },
        );

        assert_eq!(metrics.original_duration_ms, 9_000);
        assert_eq!(metrics.optimized_duration_ms, 3_000);
        assert_eq!(metrics.improvement_ms, 6_000);
        assert!((metrics.improvement_percent - 66.666).abs() < 0.01);
        assert_eq!(metrics.parallel_operations, 2);
        assert_eq!(metrics.sequential_operations, 1);
        assert_eq!(metrics.parallel_phases, 1);
        assert_eq!(metrics.sequential_phases, 1);
        assert!(metrics
            .optimizations_applied
            .contains(&OPT_PARALLEL_PHASES.to_string()));
        assert!(metrics
            .optimizations_applied
            .contains(&OPT_CRITICAL_PATH.to_string()));
        assert!(!metrics
            .optimizations_applied
            .contains(&OPT_SYNC_BARRIERS.to_string()));
    }

    #[test]
    fn test_empty_plan_metrics() {
        let config = PlannerConfig::default();
        let metrics = TimingEstimator::new(&config).metrics(&[], PlanShape::default());
        assert_eq!(metrics.original_duration_ms, 0);
        assert_eq!(metrics.improvement_percent, 0.0);
        assert!(metrics.optimizations_applied.is_empty());
    }
}
