//! Dependency leveling
//!
//! Depth of each node in a dependency DAG via memoized recursion: roots are
//! level 0, everything else is one past its deepest predecessor. Operations
//! and resource types are both levelled here.

/// Nodes found on a dependency cycle while leveling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCycle {
    pub members: Vec<usize>,
}

/// Compute levels for `deps.len()` nodes, where `deps[i]` lists the
/// predecessors of node `i`.
pub fn compute_levels(deps: &[Vec<usize>]) -> Result<Vec<usize>, LevelCycle> {
    let n = deps.len();
    let mut cache: Vec<Option<usize>> = vec![None; n];
    let mut visiting = vec![false; n];
    let mut stack = Vec::new();

    for idx in 0..n {
        compute_depth(idx, deps, &mut cache, &mut visiting, &mut stack)?;
    }

    Ok(cache.into_iter().map(|d| d.unwrap_or(0)).collect())
}

fn compute_depth(
    idx: usize,
    deps: &[Vec<usize>],
    cache: &mut [Option<usize>],
    visiting: &mut [bool],
    stack: &mut Vec<usize>,
) -> Result<usize, LevelCycle> {
    if let Some(d) = cache[idx] {
        return Ok(d);
    }
    if visiting[idx] {
        let start = stack.iter().position(|&i| i == idx).unwrap_or(0);
        return Err(LevelCycle {
            members: stack[start..].to_vec(),
        });
    }

    visiting[idx] = true;
    stack.push(idx);

    let mut depth = 0;
    for &dep in &deps[idx] {
        depth = depth.max(compute_depth(dep, deps, cache, visiting, stack)? + 1);
    }

    stack.pop();
    visiting[idx] = false;
    cache[idx] = Some(depth);
    Ok(depth)
}

/// Group node indices by level, preserving index order within each level
pub fn group_by_level(levels: &[usize]) -> Vec<Vec<usize>> {
    let max_level = levels.iter().copied().max();
    let Some(max_level) = max_level else {
        return vec![];
    };

    let mut groups = vec![Vec::new(); max_level + 1];
    for (idx, &level) in levels.iter().enumerate() {
        groups[level].push(idx);
    }
    groups
}
