//! Attribute dependency graph
//!
//! Nodes are attributes, created lazily the first time an operation references
//! one. Edges connect the operations that produce an attribute to the
//! operations that consume it.
//!
//! ```text
//! (kyc.collect)  --kyc-documents-collected-->  (kyc.verify)
//!     op-2               strength 5               op-3
//! ```

pub mod critical_path;
pub mod cycle;

use std::collections::HashMap;

use tracing::debug;

use crate::config::PlannerConfig;
use crate::types::{AttributeEdge, AttributeKind, AttributeNode, Operation, RelationKind};

pub use critical_path::{analyze_critical_path, CriticalPathAnalysis};
pub use cycle::detect_cycles;

#[derive(Debug, Clone, Default)]
pub struct AttributeGraph {
    nodes: Vec<AttributeNode>,
    index: HashMap<String, usize>,
    edges: Vec<AttributeEdge>,
}

impl AttributeGraph {
    /// Build the graph for one compilation pass
    pub fn build(operations: &[Operation], config: &PlannerConfig) -> Self {
        let mut graph = Self::default();

        for op in operations {
            for attr in &op.consumes {
                let idx = graph.ensure_node(attr, &op.domain);
                push_unique(&mut graph.nodes[idx].consumed_by, &op.id);
            }

            for attr in &op.produces {
                let idx = graph.ensure_node(attr, &op.domain);
                let node = &mut graph.nodes[idx];
                if node.produced_by.is_empty() {
                    node.kind = AttributeKind::Computed;
                    node.domain = op.domain.clone();
                }
                push_unique(&mut node.produced_by, &op.id);
                for upstream in &op.consumes {
                    push_unique(&mut node.depends_on, upstream);
                }
            }
        }

        let by_id: HashMap<&str, &Operation> =
            operations.iter().map(|op| (op.id.as_str(), op)).collect();

        for node in &mut graph.nodes {
            if node.kind == AttributeKind::Computed && node.consumed_by.is_empty() {
                node.kind = AttributeKind::Output;
            }
            node.compute_cost = node
                .produced_by
                .iter()
                .filter_map(|id| by_id.get(id.as_str()))
                .map(|op| op.estimated_duration_ms)
                .max()
                .unwrap_or(0);
        }

        graph.edges = build_edges(&graph.nodes, &by_id, config);

        debug!(
            attributes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Attribute graph built"
        );
        graph
    }

    fn ensure_node(&mut self, attr: &str, domain: &str) -> usize {
        if let Some(&idx) = self.index.get(attr) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(AttributeNode {
            id: attr.to_string(),
            domain: domain.to_string(),
            kind: AttributeKind::Input,
            produced_by: vec![],
            consumed_by: vec![],
            depends_on: vec![],
            compute_cost: 0,
            critical_path: false,
        });
        self.index.insert(attr.to_string(), idx);
        idx
    }

    pub fn nodes(&self) -> &[AttributeNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&AttributeNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [AttributeNode] {
        &mut self.nodes
    }

    pub fn edges(&self) -> &[AttributeEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_parts(self) -> (Vec<AttributeNode>, Vec<AttributeEdge>) {
        (self.nodes, self.edges)
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// One edge per (producer, consumer) pair sharing an attribute
fn build_edges(
    nodes: &[AttributeNode],
    ops: &HashMap<&str, &Operation>,
    config: &PlannerConfig,
) -> Vec<AttributeEdge> {
    let mut edges = Vec::new();

    for node in nodes {
        let strength = config.strength_for(&node.id);
        for producer_id in &node.produced_by {
            let Some(producer) = ops.get(producer_id.as_str()) else {
                continue;
            };
            let milestone = config
                .verb(&producer.verb)
                .map(|spec| spec.produces.iter().any(|p| p == &node.id))
                .unwrap_or(false);

            for consumer_id in &node.consumed_by {
                if consumer_id == producer_id {
                    continue;
                }
                let Some(consumer) = ops.get(consumer_id.as_str()) else {
                    continue;
                };

                let relation = if milestone {
                    RelationKind::Produces
                } else if !consumer.produces.is_empty() {
                    RelationKind::DerivedFrom
                } else {
                    RelationKind::Requires
                };

                edges.push(AttributeEdge {
                    from_operation: producer.id.clone(),
                    to_operation: consumer.id.clone(),
                    attribute: node.id.clone(),
                    relation,
                    strength,
                    cross_domain: producer.domain != consumer.domain,
                });
            }
        }
    }

    edges
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::Operation;

    /// Minimal operation for graph-level tests
    pub fn op(id: &str, verb: &str, consumes: &[&str], produces: &[&str]) -> Operation {
        let line = id
            .trim_start_matches("op-")
            .parse::<usize>()
            .unwrap_or(1);
        Operation {
            id: id.to_string(),
            verb: verb.to_string(),
            domain: crate::config::domain_of(verb).to_string(),
            source: format!("({})", verb),
            line,
            consumes: consumes.iter().map(|s| s.to_string()).collect(),
            produces: produces.iter().map(|s| s.to_string()).collect(),
            priority: 5,
            retryable: true,
            parallel_safe: true,
            estimated_duration_ms: 1_000,
            on_critical_path: false,
        }
    }
}
