//! End-to-end compilation scenarios

use ob_execution_planner::config::{ConfigLoader, DomainSpec, VerbSpec};
use ob_execution_planner::{
    compile_plan, AttributeKind, ConfigError, DiagnosticKind, ExecutionPlan, PlanCompiler, PlanError,
    PlannerConfig, RelationKind,
};

fn assert_topological(plan: &ExecutionPlan) {
    for edge in &plan.attribute_edges {
        let from = plan.phase_of(&edge.from_operation).unwrap();
        let to = plan.phase_of(&edge.to_operation).unwrap();
        assert!(
            from < to,
            "{} (phase {}) must precede {} (phase {})",
            edge.from_operation,
            from,
            edge.to_operation,
            to
        );
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn kyc_chain_compiles_to_increasing_levels() {
    let plan = compile_plan(
        "(kyc.start)\n(kyc.collect)\n(kyc.verify)\n(kyc.complete)",
        "case-001",
    )
    .unwrap();

    assert_eq!(plan.total_operations, 4);
    let levels: Vec<usize> = ["op-1", "op-2", "op-3", "op-4"]
        .iter()
        .map(|id| plan.phase_of(id).unwrap())
        .collect();
    assert_eq!(levels, vec![0, 1, 2, 3]);
    assert!(plan.critical_path.contains(&"op-4".to_string()));
    assert_topological(&plan);

    let complete = plan.attribute("kyc-complete").unwrap();
    assert_eq!(complete.kind, AttributeKind::Output);
    assert!(complete.critical_path);
}

#[test]
fn custody_account_alone_keeps_descriptive_prerequisites() {
    let plan = compile_plan("(resources.create-custody-account)", "case-002").unwrap();

    assert_eq!(plan.resource_order, vec!["custody-account"]);
    let custody = &plan.resource_dependencies[0];
    assert!(custody
        .prerequisites
        .contains(&"ubo-verification-complete".to_string()));
    assert!(custody.prerequisites.contains(&"kyc-complete".to_string()));
    assert!(plan.diagnostics.is_empty());
    assert_eq!(plan.failure_recovery.rollback_steps.len(), 1);
}

#[test]
fn independent_domains_share_one_parallel_phase() {
    let plan = compile_plan("(kyc.collect)\n(ubo.discover)", "case-003").unwrap();

    assert_eq!(plan.phases.len(), 1);
    let phase = &plan.phases[0];
    assert!(phase.parallelizable);
    assert_eq!(phase.execution_context.parallel_groups.len(), 2);
    assert_eq!(plan.parallel_groups, 1);
    assert_eq!(plan.optimization_metrics.parallel_operations, 2);
}

#[test]
fn malformed_lines_are_skipped() {
    let plan = compile_plan(
        "(kyc.start)\nnot a verb\n; a comment\n(kyc.collect)",
        "case-004",
    )
    .unwrap();

    assert_eq!(plan.total_operations, 2);
    assert_eq!(plan.phases.len(), 2);
    assert_eq!(plan.diagnostics.len(), 1);
    assert_eq!(plan.diagnostics[0].kind, DiagnosticKind::ParseSkip);
    assert_eq!(plan.diagnostics[0].line, Some(2));
}

#[test]
fn mutual_attribute_dependency_is_rejected() {
    let err = compile_plan(
        "(a.x @attr{B} :as @attr{A})\n(b.y @attr{A} :as @attr{B})",
        "case-005",
    )
    .unwrap_err();

    match &err {
        PlanError::CircularDependency { attribute, chain } => {
            assert!(attribute == "A" || attribute == "B");
            assert!(chain.contains(" -> "));
        }
        other => panic!("expected circular dependency, got {other}"),
    }
}

// =============================================================================
// Full onboarding
// =============================================================================

const ONBOARDING: &str = r#"
; corporate onboarding
(case.create)
(kyc.start)
(ubo.discover)
(kyc.collect)
(kyc.screen)
(ubo.calculate)
(kyc.verify)
(ubo.verify)
(kyc.complete)
(compliance.review)
(compliance.approve)
(resources.create-custody-account)
(resources.create-cash-account)
(resources.create-authority-record)
(resources.provision-settlement-instructions)
(case.close)
"#;

#[test]
fn full_onboarding_plan_is_consistent() {
    let plan = compile_plan(ONBOARDING, "case-full").unwrap();

    assert_eq!(plan.total_operations, 16);
    assert!(plan.diagnostics.is_empty());
    assert_topological(&plan);

    for (i, phase) in plan.phases.iter().enumerate() {
        assert_eq!(phase.ordinal, i);
        assert!(phase.dependencies.iter().all(|&d| d < i));
    }

    assert_eq!(
        plan.resource_order,
        vec![
            "custody-account",
            "cash-account",
            "authority-record",
            "settlement-instructions"
        ]
    );

    let custody = plan.phase_of("op-12").unwrap();
    assert!(custody > plan.phase_of("op-8").unwrap());
    assert!(custody > plan.phase_of("op-9").unwrap());

    let metrics = &plan.optimization_metrics;
    assert!(metrics.optimized_duration_ms <= metrics.original_duration_ms);
    assert_eq!(metrics.optimized_duration_ms, plan.estimated_duration_ms);
    assert_eq!(
        metrics.parallel_operations + metrics.sequential_operations,
        plan.total_operations
    );

    let steps: Vec<&str> = plan
        .failure_recovery
        .rollback_steps
        .iter()
        .map(|s| s.resource_type.as_str())
        .collect();
    assert_eq!(steps.first(), Some(&"settlement-instructions"));
    assert_eq!(steps.last(), Some(&"custody-account"));

    assert!(plan
        .synchronization_points
        .iter()
        .any(|p| p.wait_for.contains(&"approval:compliance-officer".to_string())));
    assert!(plan
        .attribute_edges
        .iter()
        .any(|e| e.relation == RelationKind::Produces && e.cross_domain));
}

#[test]
fn parallel_phases_never_hold_exclusive_resources() {
    let plan = compile_plan(ONBOARDING, "case-excl").unwrap();
    for phase in plan.phases.iter().filter(|p| p.parallelizable) {
        for op in &phase.operations {
            let exclusive = plan
                .resource_dependencies
                .iter()
                .any(|r| r.exclusive_access && r.operation_ids.contains(&op.id));
            assert!(!exclusive, "{} is exclusive in parallel phase", op.id);
        }
    }
}

#[test]
fn recompilation_is_structurally_identical() {
    let a = compile_plan(ONBOARDING, "case-idem").unwrap();
    let b = compile_plan(ONBOARDING, "case-idem").unwrap();

    assert_eq!(a.plan_id, b.plan_id);
    assert_eq!(a.phases, b.phases);
    assert_eq!(a.critical_path, b.critical_path);
    assert_eq!(a.resource_order, b.resource_order);
}

// =============================================================================
// Configuration and interchange
// =============================================================================

#[test]
fn custom_verb_registry_changes_scheduling() {
    let mut config = PlannerConfig::default();
    config.verbs.insert(
        "fund.launch".to_string(),
        VerbSpec {
            depends_on: vec!["kyc.start".to_string()],
            produces: vec!["fund-launched".to_string()],
            duration_ms: Some(900),
            ..VerbSpec::default()
        },
    );
    config.domains.insert(
        "fund".to_string(),
        DomainSpec {
            priority: 6,
            overhead_ms: 100,
        },
    );
    let compiler = PlanCompiler::with_config(config).unwrap();
    let plan = compiler.compile("(kyc.start)\n(fund.launch)", "case-fund").unwrap();

    assert_eq!(plan.phases.len(), 2);
    assert_eq!(plan.phase_of("op-2"), Some(1));
    assert_eq!(plan.phases[1].operations[0].estimated_duration_ms, 1_000);

    // Without the registry entry the two verbs are independent
    let plan = compile_plan("(kyc.start)\n(fund.launch)", "case-fund").unwrap();
    assert_eq!(plan.phases.len(), 1);
}

#[test]
fn compiler_rejects_configuration_slower_than_baseline() {
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
    assert!(err.to_string().contains("sequential baseline"));
}

#[test]
fn sample_config_file_compiles_fund_launch() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/planner.yaml");
    let config = ConfigLoader::new(path).load().unwrap();
    let plan = PlanCompiler::with_config(config)
        .unwrap()
        .compile(
            "(kyc.start)\n(kyc.collect)\n(kyc.verify)\n(kyc.complete)\n(fund.launch)",
            "case-yaml",
        )
        .unwrap();

    let launch = plan.phase_of("op-5").unwrap();
    assert!(launch > plan.phase_of("op-4").unwrap());
}

#[test]
fn plan_survives_json_interchange() {
    let plan = compile_plan(ONBOARDING, "case-json").unwrap();
    let json = plan.to_json_pretty().unwrap();

    assert!(json.contains("\"failure_strategy\""));
    assert!(json.contains("\"ROLLBACK\""));
    assert!(json.contains("\"ATTRIBUTE_READY\""));

    let back: ExecutionPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(back.phases, plan.phases);
    assert_eq!(back.synchronization_points, plan.synchronization_points);
    assert_eq!(back.plan_id, plan.plan_id);
}
