//! Resource dependency tracker
//!
//! Finds the operations that create physical or logical resources (accounts,
//! authority records, register entries), attaches each resource type's
//! creation contract from the catalog, and levels resource types so that a
//! resource is created only after the resources its prerequisites come from.
//!
//! A verb is resource-creating when the verb registry names a resource type
//! for it, or when its action starts with one of the configured creation
//! patterns (`create-`, `provision-`, ...). In the second case the type is
//! matched against catalog keys by substring; a miss degrades to an
//! uncatalogued resource with an `UnknownResourceType` diagnostic.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::config::{PlannerConfig, ResourceSpec};
use crate::error::{PlanDiagnostic, PlanError, PlanResult};
use crate::scheduler::leveling::compute_levels;
use crate::types::{FailureHandling, Operation, ResourceDependency, RetryPolicy};

/// How an operation's verb maps onto the resource catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceMatch<'a> {
    Catalogued {
        resource_type: String,
        spec: &'a ResourceSpec,
    },
    Uncatalogued {
        resource_type: String,
    },
}

impl ResourceMatch<'_> {
    pub fn resource_type(&self) -> &str {
        match self {
            ResourceMatch::Catalogued { resource_type, .. }
            | ResourceMatch::Uncatalogued { resource_type } => resource_type,
        }
    }
}

/// Output of resource tracking for one compilation
#[derive(Debug, Clone, Default)]
pub struct ResourcePlan {
    /// One contract per resource type, in creation order
    pub dependencies: Vec<ResourceDependency>,
    /// Operation id → resource type it creates
    pub by_operation: BTreeMap<String, String>,
    pub diagnostics: Vec<PlanDiagnostic>,
}

impl ResourcePlan {
    /// Resource types in creation order
    pub fn order(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|d| d.resource_type.clone())
            .collect()
    }

    pub fn resource_for(&self, operation_id: &str) -> Option<&str> {
        self.by_operation.get(operation_id).map(String::as_str)
    }

    pub fn dependency(&self, resource_type: &str) -> Option<&ResourceDependency> {
        self.dependencies
            .iter()
            .find(|d| d.resource_type == resource_type)
    }

    /// True when the operation requests an exclusive-access resource type
    pub fn is_exclusive(&self, operation_id: &str) -> bool {
        self.resource_for(operation_id)
            .and_then(|rt| self.dependency(rt))
            .map(|d| d.exclusive_access)
            .unwrap_or(false)
    }

    /// (producer, creator) pairs: the producer of a prerequisite attribute must
    /// run before the operation creating the resource that needs it.
    pub fn prerequisite_edges(&self, operations: &[Operation]) -> Vec<(String, String)> {
        let mut edges = Vec::new();
        for (creator_id, resource_type) in &self.by_operation {
            let Some(dependency) = self.dependency(resource_type) else {
                continue;
            };
            for prerequisite in &dependency.prerequisites {
                for producer in operations
                    .iter()
                    .filter(|op| op.produces.iter().any(|p| p == prerequisite))
                {
                    if &producer.id != creator_id {
                        edges.push((producer.id.clone(), creator_id.clone()));
                    }
                }
            }
        }
        edges
    }
}

pub struct ResourceTracker<'a> {
    config: &'a PlannerConfig,
}

impl<'a> ResourceTracker<'a> {
    pub fn new(config: &'a PlannerConfig) -> Self {
        Self { config }
    }

    /// Classify an operation's verb against the registry and catalog
    pub fn classify(&self, op: &Operation) -> Option<ResourceMatch<'a>> {
        let config = self.config;

        if let Some(resource_type) = config
            .verb(&op.verb)
            .and_then(|spec| spec.resource_type.as_deref())
        {
            return Some(match config.resource(resource_type) {
                Some(spec) => ResourceMatch::Catalogued {
                    resource_type: resource_type.to_string(),
                    spec,
                },
                None => ResourceMatch::Uncatalogued {
                    resource_type: resource_type.to_string(),
                },
            });
        }

        let action = op.action();
        let pattern = config
            .scheduling
            .creation_patterns
            .iter()
            .find(|p| action.starts_with(p.as_str()))?;

        // Longest catalog key first so "cash-account" beats "account"
        let mut keys: Vec<&String> = config.resources.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        if let Some(key) = keys.into_iter().find(|k| op.verb.contains(k.as_str())) {
            if let Some(spec) = config.resource(key) {
                return Some(ResourceMatch::Catalogued {
                    resource_type: key.clone(),
                    spec,
                });
            }
        }

        let inferred = action.trim_start_matches(pattern.as_str());
        let inferred = if inferred.is_empty() { action } else { inferred };
        Some(ResourceMatch::Uncatalogued {
            resource_type: inferred.to_string(),
        })
    }

    /// Derive resource contracts and their creation order
    pub fn track(&self, operations: &[Operation]) -> PlanResult<ResourcePlan> {
        let mut plan = ResourcePlan::default();
        let mut types: Vec<ResourceDependency> = Vec::new();
        let mut type_index: HashMap<String, usize> = HashMap::new();

        for op in operations {
            let Some(matched) = self.classify(op) else {
                continue;
            };
            let resource_type = matched.resource_type().to_string();

            if let ResourceMatch::Uncatalogued { .. } = matched {
                warn!(
                    verb = %op.verb,
                    resource_type = %resource_type,
                    "Resource-creating verb has no catalog entry"
                );
                plan.diagnostics.push(PlanDiagnostic::unknown_resource(
                    op.line,
                    &op.verb,
                    &resource_type,
                ));
            }

            plan.by_operation.insert(op.id.clone(), resource_type.clone());

            match type_index.get(&resource_type) {
                Some(&idx) => types[idx].operation_ids.push(op.id.clone()),
                None => {
                    type_index.insert(resource_type.clone(), types.len());
                    types.push(self.contract(&matched, op));
                }
            }
        }

        let levels = self.level(&types, operations)?;
        for (dependency, level) in types.iter_mut().zip(&levels) {
            dependency.level = *level;
        }

        // Stable sort keeps first-appearance order within a level
        types.sort_by_key(|d| d.level);
        plan.dependencies = types;

        debug!(
            resources = plan.dependencies.len(),
            creating_operations = plan.by_operation.len(),
            "Resource dependencies tracked"
        );
        Ok(plan)
    }

    fn contract(&self, matched: &ResourceMatch<'_>, op: &Operation) -> ResourceDependency {
        match matched {
            ResourceMatch::Catalogued {
                resource_type,
                spec,
            } => ResourceDependency {
                resource_type: resource_type.clone(),
                operation_ids: vec![op.id.clone()],
                creation_verb: spec
                    .creation_verb
                    .clone()
                    .unwrap_or_else(|| op.verb.clone()),
                prerequisites: spec.prerequisites.clone(),
                wait_condition: spec.wait_condition.clone(),
                failure_handling: spec.failure_handling,
                estimated_creation_ms: spec.creation_ms,
                retry_policy: spec.retry.clone(),
                priority: spec.priority,
                exclusive_access: spec.exclusive_access,
                catalogued: true,
                level: 0,
            },
            ResourceMatch::Uncatalogued { resource_type } => ResourceDependency {
                resource_type: resource_type.clone(),
                operation_ids: vec![op.id.clone()],
                creation_verb: op.verb.clone(),
                prerequisites: vec![],
                wait_condition: None,
                failure_handling: FailureHandling::default(),
                estimated_creation_ms: 0,
                retry_policy: RetryPolicy::default(),
                priority: self.config.default_domain.priority,
                exclusive_access: false,
                catalogued: false,
                level: 0,
            },
        }
    }

    /// Resource type R depends on R' when one of R's prerequisites is produced
    /// by an operation creating R'.
    fn level(
        &self,
        types: &[ResourceDependency],
        operations: &[Operation],
    ) -> PlanResult<Vec<usize>> {
        let ops_by_id: HashMap<&str, &Operation> =
            operations.iter().map(|op| (op.id.as_str(), op)).collect();

        let mut producing_type: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, dependency) in types.iter().enumerate() {
            for op_id in &dependency.operation_ids {
                if let Some(op) = ops_by_id.get(op_id.as_str()) {
                    for attr in &op.produces {
                        producing_type.entry(attr.as_str()).or_default().push(idx);
                    }
                }
            }
        }

        let deps: Vec<Vec<usize>> = types
            .iter()
            .enumerate()
            .map(|(idx, dependency)| {
                let mut preds: Vec<usize> = dependency
                    .prerequisites
                    .iter()
                    .filter_map(|p| producing_type.get(p.as_str()))
                    .flatten()
                    .copied()
                    .filter(|&p| p != idx)
                    .collect();
                preds.sort_unstable();
                preds.dedup();
                preds
            })
            .collect();

        compute_levels(&deps).map_err(|cycle| {
            let names: Vec<&str> = cycle
                .members
                .iter()
                .map(|&i| types[i].resource_type.as_str())
                .collect();
            PlanError::phase(format!(
                "resource prerequisites form a cycle: {}",
                names.join(" -> ")
            ))
        })
    }
}
