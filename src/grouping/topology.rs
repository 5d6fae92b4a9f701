use indexmap::{IndexMap, IndexSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Result of a dependency sort: the ordered nodes, plus whatever could not
/// be placed because it sits on a cycle (in input order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologicalOrder<T = String> {
    pub ordered: Vec<T>,
    pub cyclic: Vec<T>,
}

impl<T> TopologicalOrder<T> {
    pub fn is_complete(&self) -> bool {
        self.cyclic.is_empty()
    }
}

/// Kahn's algorithm over `(before, after)` edges. Among nodes that are ready
/// at the same time, the one listed first in `nodes` wins, so the output is
/// stable for identical input. Self-edges and edges to unknown nodes are
/// ignored.
pub fn stable_order(nodes: &[String], edges: &[(String, String)]) -> TopologicalOrder {
    let position: IndexMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    let index_edges: Vec<(usize, usize)> = edges
        .iter()
        .filter_map(|(before, after)| {
            Some((*position.get(before.as_str())?, *position.get(after.as_str())?))
        })
        .collect();

    let order = stable_index_order(nodes.len(), &index_edges);
    TopologicalOrder {
        ordered: order.ordered.into_iter().map(|idx| nodes[idx].clone()).collect(),
        cyclic: order.cyclic.into_iter().map(|idx| nodes[idx].clone()).collect(),
    }
}

/// Same as [`stable_order`] over the nodes `0..len`.
pub fn stable_index_order(len: usize, edges: &[(usize, usize)]) -> TopologicalOrder<usize> {
    let mut indegree = vec![0usize; len];
    let mut outgoing: Vec<IndexSet<usize>> = vec![IndexSet::new(); len];

    for &(from, to) in edges {
        if from == to || from >= len || to >= len {
            continue;
        }
        if outgoing[from].insert(to) {
            indegree[to] += 1;
        }
    }

    let mut ready = BinaryHeap::new();
    for (idx, degree) in indegree.iter().enumerate() {
        if *degree == 0 {
            ready.push(Reverse(idx));
        }
    }

    let mut ordered = Vec::with_capacity(len);
    let mut placed = vec![false; len];
    while let Some(Reverse(current)) = ready.pop() {
        ordered.push(current);
        placed[current] = true;

        for &next in &outgoing[current] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    let cyclic = (0..len).filter(|idx| !placed[*idx]).collect();

    TopologicalOrder { ordered, cyclic }
}
