//! Cycle detection over attribute → dependency edges
//!
//! Depth-first traversal with an explicit recursion stack. The first node
//! revisited while still on the stack is reported; a cycle is fatal.

use tracing::warn;

use super::AttributeGraph;
use crate::error::{PlanError, PlanResult};

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    OnStack,
    Done,
}

/// Fail with `CircularDependency` if any attribute transitively depends on itself
pub fn detect_cycles(graph: &AttributeGraph) -> PlanResult<()> {
    let mut state = vec![VisitState::Unvisited; graph.len()];
    let mut stack: Vec<usize> = Vec::new();

    for idx in 0..graph.len() {
        if state[idx] == VisitState::Unvisited {
            visit(graph, idx, &mut state, &mut stack)?;
        }
    }

    Ok(())
}

fn visit(
    graph: &AttributeGraph,
    idx: usize,
    state: &mut [VisitState],
    stack: &mut Vec<usize>,
) -> PlanResult<()> {
    state[idx] = VisitState::OnStack;
    stack.push(idx);

    for dep in &graph.nodes()[idx].depends_on {
        let Some(dep_idx) = graph.index_of(dep) else {
            continue;
        };
        match state[dep_idx] {
            VisitState::OnStack => return Err(cycle_error(graph, stack, dep_idx)),
            VisitState::Unvisited => visit(graph, dep_idx, state, stack)?,
            VisitState::Done => {}
        }
    }

    stack.pop();
    state[idx] = VisitState::Done;
    Ok(())
}

fn cycle_error(graph: &AttributeGraph, stack: &[usize], revisited: usize) -> PlanError {
    let start = stack.iter().position(|&i| i == revisited).unwrap_or(0);
    let nodes = graph.nodes();
    let mut chain: Vec<&str> = stack[start..]
        .iter()
        .map(|&i| nodes[i].id.as_str())
        .collect();
    chain.push(nodes[revisited].id.as_str());
    let chain = chain.join(" -> ");

    warn!("Circular attribute dependency: {}", chain);

    PlanError::CircularDependency {
        attribute: nodes[revisited].id.clone(),
        chain,
    }
}
