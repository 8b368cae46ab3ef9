//! OB Execution Planner - onboarding DSL to phased execution plans
//!
//! Compiles the accumulated onboarding DSL for a case (KYC, UBO, documents,
//! resource provisioning) into an [`ExecutionPlan`]: operations grouped into
//! dependency-ordered phases, with parallelism, synchronization barriers,
//! resource creation order, timing estimates and a rollback directive for the
//! downstream executor.
//!
//! ## Pipeline
//! DSL Text -> Operations -> Attribute Graph -> Cycle Check -> Critical Path
//! -> Phases -> Sync Points -> Metrics -> ExecutionPlan
//!
//! ## Quick Start
//!
//! ```rust
//! use ob_execution_planner::compile_plan;
//!
//! let dsl = "(kyc.start)\n(kyc.collect)\n(ubo.discover)";
//! let plan = compile_plan(dsl, "case-001").unwrap();
//! assert_eq!(plan.total_operations, 3);
//! ```
//!
//! Policy tables (verb registry, resource catalog, timings) live in
//! [`PlannerConfig`]; pass a custom one through [`PlanCompiler::with_config`],
//! which rejects configurations that fail validation.

// Core error handling
pub mod error;

// Plan data model
pub mod types;

// Verb registry, resource catalog and scheduling policy
pub mod config;

// Compilation stages
pub mod extractor;
pub mod graph;
pub mod resources;
pub mod scheduler;
pub mod sync;
pub mod timing;
pub mod recovery;

pub mod compiler;

pub use compiler::{describe_plan, PlanCompiler};
pub use config::{ConfigLoader, PlannerConfig};
pub use error::{ConfigError, DiagnosticKind, PlanDiagnostic, PlanError, PlanResult};
pub use types::{
    AttributeEdge, AttributeKind, AttributeNode, ExecutionPhase, ExecutionPlan, FailureStrategy,
    OnTimeout, Operation, OptimizationMetrics, RelationKind, ResourceDependency,
    SynchronizationPoint,
};

/// Compile with the built-in onboarding configuration
pub fn compile_plan(dsl: &str, session_id: &str) -> PlanResult<ExecutionPlan> {
    PlanCompiler::new().compile(dsl, session_id)
}
