use std::collections::VecDeque;

use crate::ir::Graph;

/// Kahn layering over node indices. Returns each layer's node indices in
/// dequeue order. Nodes on or downstream of a cycle never reach in-degree
/// zero and are absent from every layer.
pub(super) fn assign_layers(graph: &Graph) -> Vec<Vec<usize>> {
    let count = graph.nodes.len();
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut indegree = vec![0usize; count];

    for edge in &graph.edges {
        let (Some(from), Some(to)) = (
            graph.nodes.get_index_of(&edge.from),
            graph.nodes.get_index_of(&edge.to),
        ) else {
            continue;
        };
        outgoing[from].push(to);
        indegree[to] += 1;
    }

    let mut queue: VecDeque<(usize, usize)> = (0..count)
        .filter(|&idx| indegree[idx] == 0)
        .map(|idx| (idx, 0))
        .collect();
    let mut recorded = vec![false; count];
    let mut layers: Vec<Vec<usize>> = Vec::new();

    while let Some((idx, layer)) = queue.pop_front() {
        if recorded[idx] {
            continue;
        }
        recorded[idx] = true;
        if layers.len() <= layer {
            layers.resize_with(layer + 1, Vec::new);
        }
        layers[layer].push(idx);

        for &next in &outgoing[idx] {
            indegree[next] = indegree[next].saturating_sub(1);
            if indegree[next] == 0 {
                queue.push_back((next, layer + 1));
            }
        }
    }

    layers
}
