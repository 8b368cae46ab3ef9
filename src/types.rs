//! Execution plan data model
//!
//! Every type here is `serde` serialisable: the compiled [`ExecutionPlan`] is
//! a JSON interchange artifact read by the downstream executor and by
//! observability sinks. Field names are stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlanDiagnostic;

// ============================================================================
// Operations
// ============================================================================

/// One parsed DSL verb invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Stable identifier, `op-<n>` in source order
    pub id: String,
    /// Full dotted verb, e.g. `kyc.verify`
    pub verb: String,
    /// Verb prefix before the first dot
    pub domain: String,
    /// Trimmed source fragment
    pub source: String,
    /// 1-based source line
    pub line: usize,
    /// Attribute references consumed, in first-seen order
    pub consumes: Vec<String>,
    /// Attribute references produced, in first-seen order
    pub produces: Vec<String>,
    pub priority: u8,
    pub retryable: bool,
    pub parallel_safe: bool,
    pub estimated_duration_ms: u64,
    /// Set once by the critical path analyzer
    #[serde(default)]
    pub on_critical_path: bool,
}

impl Operation {
    pub fn action(&self) -> &str {
        self.verb
            .split_once('.')
            .map(|(_, action)| action)
            .unwrap_or(&self.verb)
    }

    pub fn describe(&self) -> String {
        if self.produces.is_empty() {
            format!("{} (line {})", self.verb, self.line)
        } else {
            format!(
                "{} (line {}) -> {}",
                self.verb,
                self.line,
                self.produces.join(", ")
            )
        }
    }
}

// ============================================================================
// Attribute graph
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeKind {
    /// Referenced but never produced in this DSL
    Input,
    /// Produced and consumed
    Computed,
    /// Produced and never consumed
    Output,
}

/// One distinct attribute reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeNode {
    pub id: String,
    /// Domain of the first producer, or of the first referencing operation
    pub domain: String,
    pub kind: AttributeKind,
    pub produced_by: Vec<String>,
    pub consumed_by: Vec<String>,
    /// Upstream attributes this one is derived from
    pub depends_on: Vec<String>,
    pub compute_cost: u64,
    pub critical_path: bool,
}

/// Kind of a producer → consumer edge.
///
/// Every edge starts as a plain requirement; `REQUIRES` is the relation of
/// any consumer that only reads the attribute. Two refinements replace it:
/// `PRODUCES` when the attribute is a registry milestone of the producer's
/// verb (taking precedence over the other two), and `DERIVED_FROM` when the
/// consumer produces attributes of its own. Scheduling treats all three alike;
/// the kind only informs consumers of the serialized plan. The mapping is
/// recorded under "Relations" in DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// Consumer needs the attribute and derives nothing from it
    Requires,
    /// The attribute is a declared milestone output of the producer's verb
    Produces,
    /// Consumer derives attributes of its own from the shared one
    DerivedFrom,
}

/// Producer → consumer relation mediated by a shared attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEdge {
    pub from_operation: String,
    pub to_operation: String,
    pub attribute: String,
    pub relation: RelationKind,
    /// 1..=10, tie-break for intra-phase ordering
    pub strength: u8,
    pub cross_domain: bool,
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureHandling {
    #[default]
    RollbackPartialResources,
    RetryThenRollback,
    ManualIntervention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Backoff {
    Fixed,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2_000,
            backoff: Backoff::Exponential,
        }
    }
}

/// One resource type's creation contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDependency {
    pub resource_type: String,
    /// Operations that create this resource, in source order
    pub operation_ids: Vec<String>,
    pub creation_verb: String,
    pub prerequisites: Vec<String>,
    pub wait_condition: Option<String>,
    pub failure_handling: FailureHandling,
    pub estimated_creation_ms: u64,
    pub retry_policy: RetryPolicy,
    pub priority: u8,
    pub exclusive_access: bool,
    /// False when the type was inferred from the verb name alone
    pub catalogued: bool,
    /// Depth in the resource dependency leveling
    pub level: usize,
}

impl ResourceDependency {
    /// Health check the executor waits on after creation
    pub fn wait_target(&self) -> String {
        self.wait_condition
            .clone()
            .unwrap_or_else(|| format!("resource-created:{}", self.resource_type))
    }
}

// ============================================================================
// Phases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureStrategy {
    Rollback,
    Retry,
    FailFast,
}

/// Same-domain operations that may run together inside a parallel phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelGroup {
    pub group_id: String,
    pub domain: String,
    pub operation_ids: Vec<String>,
}

/// Trace metadata stamped onto phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub session_id: String,
    pub trace_id: String,
    #[serde(default)]
    pub parallel_groups: Vec<ParallelGroup>,
}

/// Operations sharing one dependency depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPhase {
    /// 0-based, contiguous
    pub ordinal: usize,
    pub operations: Vec<Operation>,
    /// Ordinals of phases holding direct predecessors
    pub dependencies: Vec<usize>,
    pub parallelizable: bool,
    pub estimated_duration_ms: u64,
    pub resources_needed: Vec<String>,
    pub wait_conditions: Vec<String>,
    pub optimization_hints: Vec<String>,
    pub failure_strategy: FailureStrategy,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub execution_context: ExecutionContext,
}

impl ExecutionPhase {
    pub fn operation_ids(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|op| op.id.as_str())
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.operations.iter().any(|op| op.id == operation_id)
    }
}

// ============================================================================
// Synchronization
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnTimeout {
    Fail,
    Retry,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncCondition {
    AttributeReady {
        attribute: String,
    },
    ResourceCreated {
        resource_type: String,
        wait_condition: Option<String>,
    },
    ExternalApproval {
        approver: String,
        operation_id: String,
    },
}

/// Barrier the executor must honor after a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizationPoint {
    pub name: String,
    pub after_phase: usize,
    pub wait_for: Vec<String>,
    pub timeout_ms: u64,
    pub on_timeout: OnTimeout,
    pub critical: bool,
    pub conditions: Vec<SyncCondition>,
}

// ============================================================================
// Metrics and recovery
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    /// Naive fully-sequential baseline
    pub original_duration_ms: u64,
    pub optimized_duration_ms: u64,
    pub improvement_ms: u64,
    pub improvement_percent: f64,
    pub parallel_operations: usize,
    pub sequential_operations: usize,
    pub parallel_phases: usize,
    pub sequential_phases: usize,
    pub critical_path_length: usize,
    pub optimizations_applied: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    Rollback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackAction {
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackCondition {
    OnFailure,
}

/// Compensating action for one resource-creating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackStep {
    pub step_id: String,
    pub operation_id: String,
    pub resource_type: String,
    pub phase: usize,
    pub action: RollbackAction,
    pub condition: RollbackCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecoveryPlan {
    pub strategy: RecoveryStrategy,
    pub rollback_steps: Vec<RollbackStep>,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub notification_targets: Vec<String>,
}

// ============================================================================
// Plan
// ============================================================================

/// The compiled artifact. Built once per compilation and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub plan_id: Uuid,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub phases: Vec<ExecutionPhase>,
    pub total_operations: usize,
    pub parallel_groups: usize,
    /// Operation ids ordered by phase, then source line
    pub critical_path: Vec<String>,
    /// Resource types in creation order
    pub resource_order: Vec<String>,
    pub resource_dependencies: Vec<ResourceDependency>,
    pub synchronization_points: Vec<SynchronizationPoint>,
    pub estimated_duration_ms: u64,
    pub optimization_metrics: OptimizationMetrics,
    pub failure_recovery: FailureRecoveryPlan,
    pub attributes: Vec<AttributeNode>,
    pub attribute_edges: Vec<AttributeEdge>,
    pub diagnostics: Vec<PlanDiagnostic>,
}

impl ExecutionPlan {
    /// Ordinal of the phase holding `operation_id`
    pub fn phase_of(&self, operation_id: &str) -> Option<usize> {
        self.phases
            .iter()
            .find(|phase| phase.contains(operation_id))
            .map(|phase| phase.ordinal)
    }

    /// All operations in execution order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.phases.iter().flat_map(|phase| phase.operations.iter())
    }

    pub fn attribute(&self, id: &str) -> Option<&AttributeNode> {
        self.attributes.iter().find(|node| node.id == id)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
