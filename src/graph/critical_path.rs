//! Critical path analysis
//!
//! Longest weighted path through the attribute graph. A node's weight is its
//! compute cost; relaxation runs to a fixed point over
//! `longest[n] = max(longest[dep]) + cost[n]`. The graph must already be known
//! to be acyclic.
//!
//! Nodes reaching the global maximum are critical, and so is every tight
//! predecessor on a chain leading to them. The result is advisory: it drives
//! synchronization and hints, not correctness.

use std::collections::BTreeSet;

use tracing::debug;

use super::AttributeGraph;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriticalPathAnalysis {
    /// Critical attribute ids, in graph order
    pub attributes: Vec<String>,
    /// Operations producing a critical attribute
    pub operations: BTreeSet<String>,
    /// Longest path value
    pub length_ms: u64,
}

impl CriticalPathAnalysis {
    pub fn contains_operation(&self, operation_id: &str) -> bool {
        self.operations.contains(operation_id)
    }
}

/// Mark critical attributes on the graph and return the analysis
pub fn analyze_critical_path(graph: &mut AttributeGraph) -> CriticalPathAnalysis {
    let n = graph.len();
    if n == 0 {
        return CriticalPathAnalysis::default();
    }

    let deps: Vec<Vec<usize>> = graph
        .nodes()
        .iter()
        .map(|node| {
            node.depends_on
                .iter()
                .filter_map(|d| graph.index_of(d))
                .collect()
        })
        .collect();
    let cost: Vec<u64> = graph.nodes().iter().map(|node| node.compute_cost).collect();

    let mut longest = cost.clone();
    // An acyclic graph settles within n passes.
    for _ in 0..=n {
        let mut changed = false;
        for idx in 0..n {
            let Some(best_dep) = deps[idx].iter().map(|&d| longest[d]).max() else {
                continue;
            };
            let candidate = best_dep + cost[idx];
            if candidate > longest[idx] {
                longest[idx] = candidate;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let max = longest.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return CriticalPathAnalysis::default();
    }

    let mut critical = vec![false; n];
    let mut worklist: Vec<usize> = (0..n).filter(|&i| longest[i] == max).collect();
    while let Some(idx) = worklist.pop() {
        if critical[idx] {
            continue;
        }
        critical[idx] = true;
        for &dep in &deps[idx] {
            if longest[dep] + cost[idx] == longest[idx] && !critical[dep] {
                worklist.push(dep);
            }
        }
    }

    let mut analysis = CriticalPathAnalysis {
        length_ms: max,
        ..CriticalPathAnalysis::default()
    };
    for (idx, node) in graph.nodes_mut().iter_mut().enumerate() {
        if critical[idx] {
            node.critical_path = true;
            analysis.attributes.push(node.id.clone());
            analysis
                .operations
                .extend(node.produced_by.iter().cloned());
        }
    }

    debug!(
        length_ms = max,
        attributes = analysis.attributes.len(),
        operations = analysis.operations.len(),
        "Critical path analysed"
    );
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::graph::test_support::op;
    use crate::types::Operation;

    fn with_duration(mut op: Operation, ms: u64) -> Operation {
        op.estimated_duration_ms = ms;
        op
    }

    #[test]
    fn test_chain_is_fully_critical() {
        let ops = vec![
            op("op-1", "a.x", &[], &["a"]),
            op("op-2", "a.y", &["a"], &["b"]),
            op("op-3", "a.z", &["b"], &["c"]),
        ];
        let mut graph = AttributeGraph::build(&ops, &PlannerConfig::default());
        let analysis = analyze_critical_path(&mut graph);

        assert_eq!(analysis.length_ms, 3_000);
        assert_eq!(analysis.attributes, vec!["a", "b", "c"]);
        assert_eq!(analysis.operations.len(), 3);
        assert!(graph.nodes().iter().all(|n| n.critical_path));
    }

    #[test]
    fn test_shorter_branch_not_critical() {
        let ops = vec![
            op("op-1", "a.root", &[], &["root"]),
            with_duration(op("op-2", "a.slow", &["root"], &["slow"]), 2_500),
            with_duration(op("op-3", "a.fast", &["root"], &["fast"]), 200),
            op("op-4", "a.join", &["slow", "fast"], &["done"]),
        ];
        let mut graph = AttributeGraph::build(&ops, &PlannerConfig::default());
        let analysis = analyze_critical_path(&mut graph);

        assert_eq!(analysis.length_ms, 1_000 + 2_500 + 1_000);
        assert!(analysis.contains_operation("op-1"));
        assert!(analysis.contains_operation("op-2"));
        assert!(!analysis.contains_operation("op-3"));
        assert!(analysis.contains_operation("op-4"));
        assert!(!graph.node("fast").unwrap().critical_path);
    }

    #[test]
    fn test_inputs_only_graph_has_no_critical_path() {
        let ops = vec![op("op-1", "a.x", &["in1", "in2"], &[])];
        let mut graph = AttributeGraph::build(&ops, &PlannerConfig::default());
        let analysis = analyze_critical_path(&mut graph);
        assert!(analysis.attributes.is_empty());
        assert!(analysis.operations.is_empty());
        assert!(graph.nodes().iter().all(|n| !n.critical_path));
    }

    #[test]
    fn test_parallel_equal_chains_both_critical() {
        let ops = vec![
            op("op-1", "a.x", &[], &["left"]),
            op("op-2", "b.x", &[], &["right"]),
        ];
        let mut graph = AttributeGraph::build(&ops, &PlannerConfig::default());
        let analysis = analyze_critical_path(&mut graph);
        assert_eq!(analysis.operations.len(), 2);
    }
}
