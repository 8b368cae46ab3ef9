//! Plan compiler
//!
//! Single-pass pipeline from DSL text to [`ExecutionPlan`]:
//!
//! ```text
//! extract -> attribute graph -> cycle check -> critical path
//!         -> resources -> phases -> sync points -> timing -> recovery
//! ```
//!
//! A compilation either returns a complete plan or one [`PlanError`]; no
//! partial plan is ever handed back. The compiler holds no mutable state, so
//! one instance can serve concurrent compilations.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::error::{ConfigError, PlanResult};
use crate::extractor::OperationExtractor;
use crate::graph::{analyze_critical_path, detect_cycles, AttributeGraph};
use crate::recovery::RecoveryPlanner;
use crate::resources::ResourceTracker;
use crate::scheduler::Scheduler;
use crate::sync::SyncInserter;
use crate::timing::{PlanShape, TimingEstimator};
use crate::types::{ExecutionPhase, ExecutionPlan};

#[derive(Debug, Clone)]
pub struct PlanCompiler {
    config: Arc<PlannerConfig>,
}

impl Default for PlanCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanCompiler {
    /// Compiler with the built-in onboarding catalog
    pub fn new() -> Self {
        Self {
            config: Arc::new(PlannerConfig::default()),
        }
    }

    /// Compiler with a custom configuration.
    ///
    /// The configuration is validated first; an operation slower than the
    /// sequential baseline would let a plan exceed its own baseline.
    pub fn with_config(config: PlannerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Compile DSL text into an execution plan
    pub fn compile(&self, dsl: &str, session_id: &str) -> PlanResult<ExecutionPlan> {
        let config = self.config.as_ref();
        let plan_id = plan_id(session_id, dsl);
        let trace_id = format!("trace-{}", plan_id.simple());

        let extraction = OperationExtractor::new(config).extract(dsl);
        let mut operations = extraction.operations;

        let mut graph = AttributeGraph::build(&operations, config);
        detect_cycles(&graph)?;

        let analysis = analyze_critical_path(&mut graph);
        for op in &mut operations {
            op.on_critical_path = analysis.contains_operation(&op.id);
        }

        let resources = ResourceTracker::new(config).track(&operations)?;
        let phases = Scheduler::new(config).build_phases(
            &operations,
            graph.edges(),
            &resources,
            session_id,
            &trace_id,
        )?;

        let synchronization_points = SyncInserter::new(config).insert(&phases, &resources);
        let critical_path = critical_path(&phases);

        let timing = TimingEstimator::new(config);
        let estimated_duration_ms = timing.total_duration(&phases);
        let optimization_metrics = timing.metrics(
            &phases,
            PlanShape {
                critical_path_length: critical_path.len(),
                synchronization_points: synchronization_points.len(),
                resource_types: resources.dependencies.len(),
            },
        );
        let failure_recovery = RecoveryPlanner::new(config).plan(&phases, &resources);

        let mut diagnostics = extraction.diagnostics;
        diagnostics.extend(resources.diagnostics.iter().cloned());

        let (attributes, attribute_edges) = graph.into_parts();
        let plan = ExecutionPlan {
            plan_id,
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            total_operations: operations.len(),
            parallel_groups: phases.iter().filter(|p| p.parallelizable).count(),
            critical_path,
            resource_order: resources.order(),
            resource_dependencies: resources.dependencies,
            synchronization_points,
            estimated_duration_ms,
            optimization_metrics,
            failure_recovery,
            attributes,
            attribute_edges,
            diagnostics,
            phases,
        };

        info!(
            session_id,
            plan_id = %plan.plan_id,
            operations = plan.total_operations,
            phases = plan.phases.len(),
            estimated_duration_ms = plan.estimated_duration_ms,
            "Execution plan compiled"
        );
        Ok(plan)
    }
}

/// Stable across recompilations of the same session and text
fn plan_id(session_id: &str, dsl: &str) -> Uuid {
    let name = format!("{}\n{}", session_id, dsl);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Critical operations ordered by phase, then source line
fn critical_path(phases: &[ExecutionPhase]) -> Vec<String> {
    phases
        .iter()
        .flat_map(|phase| {
            let mut ops: Vec<_> = phase
                .operations
                .iter()
                .filter(|op| op.on_critical_path)
                .collect();
            ops.sort_by_key(|op| op.line);
            ops.into_iter().map(|op| op.id.clone())
        })
        .collect()
}

/// Human-readable dry-run listing
pub fn describe_plan(plan: &ExecutionPlan) -> String {
    let mut output = String::new();
    output.push_str("Execution Plan\n");
    output.push_str("==============\n\n");
    output.push_str(&format!("Session: {}\n", plan.session_id));
    output.push_str(&format!("Total operations: {}\n", plan.total_operations));
    output.push_str(&format!(
        "Estimated duration: {}ms (sequential {}ms, {:.1}% faster)\n\n",
        plan.estimated_duration_ms,
        plan.optimization_metrics.original_duration_ms,
        plan.optimization_metrics.improvement_percent
    ));

    for phase in &plan.phases {
        let mode = if phase.parallelizable {
            "parallel"
        } else {
            "sequential"
        };
        output.push_str(&format!(
            "Phase {} ({}, {}ms)\n",
            phase.ordinal, mode, phase.estimated_duration_ms
        ));
        output.push_str(&"-".repeat(40));
        output.push('\n');

        for op in &phase.operations {
            let marker = if op.on_critical_path { "*" } else { " " };
            output.push_str(&format!("  {}[{}] {}\n", marker, op.id, op.describe()));
        }

        for group in &phase.execution_context.parallel_groups {
            output.push_str(&format!(
                "    group {} ({}): {}\n",
                group.group_id,
                group.domain,
                group.operation_ids.join(", ")
            ));
        }

        for point in plan
            .synchronization_points
            .iter()
            .filter(|p| p.after_phase == phase.ordinal)
        {
            output.push_str(&format!(
                "  sync {} waits for: {}\n",
                point.name,
                point.wait_for.join(", ")
            ));
        }
        output.push('\n');
    }

    if !plan.resource_order.is_empty() {
        output.push_str(&format!(
            "Resource order: {}\n",
            plan.resource_order.join(" -> ")
        ));
    }
    if !plan.critical_path.is_empty() {
        output.push_str(&format!("Critical path: {}\n", plan.critical_path.join(" -> ")));
    }
    for diagnostic in &plan.diagnostics {
        output.push_str(&format!("warning: {}\n", diagnostic.message));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VerbSpec;
    use crate::error::{DiagnosticKind, PlanError};

    #[test]
    fn test_compile_kyc_chain() {
        let plan = PlanCompiler::new()
            .compile("(kyc.start)\n(kyc.collect)\n(kyc.verify)\n(kyc.complete)", "s1")
            .unwrap();

        assert_eq!(plan.total_operations, 4);
        assert_eq!(plan.phases.len(), 4);
        assert_eq!(plan.critical_path, vec!["op-1", "op-2", "op-3", "op-4"]);
        assert_eq!(plan.phase_of("op-4"), Some(3));
        assert_eq!(
            plan.estimated_duration_ms,
            plan.phases.iter().map(|p| p.estimated_duration_ms).sum::<u64>()
        );
        assert!(plan.diagnostics.is_empty());
    }

    #[test]
    fn test_cycle_aborts_compilation() {
        let err = PlanCompiler::new()
            .compile("(a.x @attr{B} :as @attr{A})\n(b.y @attr{A} :as @attr{B})", "s1")
            .unwrap_err();
        let attr = err.offending_attribute().unwrap();
        assert!(attr == "A" || attr == "B");
    }

    #[test]
    fn test_rule_cycle_is_phase_construction_error() {
        let err = PlanCompiler::new()
            .compile("(ubo.discover @attr{x})\n(ubo.verify :as @attr{x})", "s1")
            .unwrap_err();
        assert!(matches!(err, PlanError::PhaseConstruction { .. }));
    }

    #[test]
    fn test_with_config_rejects_operation_slower_than_baseline() {
        let mut config = PlannerConfig::default();
        config.verbs.insert(
            "slow.step".to_string(),
            VerbSpec {
                duration_ms: Some(5_000),
                ..VerbSpec::default()
            },
        );
        let err = PlanCompiler::with_config(config).unwrap_err();
        assert!(matches!(err, ConfigError::DurationExceedsBaseline { .. }));
    }

    #[test]
    fn test_with_config_keeps_plan_within_baseline() {
        let mut config = PlannerConfig::default();
        config.verbs.insert(
            "slow.step".to_string(),
            VerbSpec {
                duration_ms: Some(2_900),
                ..VerbSpec::default()
            },
        );
        config.domains.clear();
        config.default_domain.overhead_ms = 100;
        let plan = PlanCompiler::with_config(config)
            .unwrap()
            .compile("(slow.step)\n(slow.step)", "s1")
            .unwrap();
        let metrics = &plan.optimization_metrics;
        assert_eq!(metrics.original_duration_ms, 6_000);
        assert!(metrics.optimized_duration_ms <= metrics.original_duration_ms);
    }

    #[test]
    fn test_plan_id_is_deterministic() {
        let compiler = PlanCompiler::new();
        let a = compiler.compile("(kyc.start)", "s1").unwrap();
        let b = compiler.compile("(kyc.start)", "s1").unwrap();
        let c = compiler.compile("(kyc.start)", "s2").unwrap();
        assert_eq!(a.plan_id, b.plan_id);
        assert_ne!(a.plan_id, c.plan_id);
        assert_eq!(
            a.phases[0].execution_context.trace_id,
            format!("trace-{}", a.plan_id.simple())
        );
    }

    #[test]
    fn test_diagnostics_collected() {
        let plan = PlanCompiler::new()
            .compile("not a verb\n(resources.create-widget)", "s1")
            .unwrap();
        let kinds: Vec<DiagnosticKind> = plan.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::ParseSkip, DiagnosticKind::UnknownResourceType]
        );
    }

    #[test]
    fn test_empty_dsl_compiles_to_empty_plan() {
        let plan = PlanCompiler::new().compile("", "s1").unwrap();
        assert!(plan.phases.is_empty());
        assert_eq!(plan.estimated_duration_ms, 0);
        assert_eq!(plan.optimization_metrics.original_duration_ms, 0);
    }

    #[test]
    fn test_describe_plan() {
        let plan = PlanCompiler::new()
            .compile("(kyc.collect)\n(ubo.discover)\n(resources.create-custody-account)", "s1")
            .unwrap();
        let text = describe_plan(&plan);
        assert!(text.starts_with("Execution Plan\n=============="));
        assert!(text.contains("Phase 0 (sequential"));
        assert!(text.contains("kyc.collect"));
        assert!(text.contains("Resource order: custody-account"));
    }
}
