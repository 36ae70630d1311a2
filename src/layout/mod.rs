mod ranking;
pub(crate) mod routing;
pub(crate) mod text;

pub use text::TextBlock;

use crate::config::LayoutConfig;
use crate::ir::{Graph, Point, Size};
use ranking::assign_layers;
use routing::assign_ports;

/// Positions nodes and assigns edge ports in place. Output depends only on
/// the graph structure and `config`; previous positions are discarded.
pub fn compute_layout(graph: &mut Graph, config: &LayoutConfig) {
    reset_layout(graph, config);

    let layers = assign_layers(graph);
    place_layers(graph, &layers, config);
    assign_ports(graph);

    let placed = layers.iter().map(Vec::len).sum::<usize>();
    let omitted = graph.nodes.len() - placed;
    if omitted > 0 {
        let ids: Vec<&str> = graph
            .nodes
            .values()
            .filter(|node| !node.is_placed())
            .map(|node| node.id.as_str())
            .collect();
        tracing::debug!(omitted, ?ids, "nodes on or behind a cycle left unplaced");
    }
    tracing::debug!(
        layers = layers.len(),
        placed,
        direction = ?graph.direction,
        "computed layered layout"
    );
}

fn reset_layout(graph: &mut Graph, config: &LayoutConfig) {
    let size = Size::new(config.node_width, config.node_height);
    for node in graph.nodes.values_mut() {
        node.position = None;
        node.rank = None;
        node.size = size;
    }
    for edge in &mut graph.edges {
        edge.clear_ports();
    }
}

/// Layers advance along the long axis by a fixed pitch; nodes in a layer
/// are packed on the cross axis and centered against the widest layer.
fn place_layers(graph: &mut Graph, layers: &[Vec<usize>], config: &LayoutConfig) {
    let horizontal = graph.direction.is_horizontal();
    let (long_extent, cross_extent) = if horizontal {
        (config.node_width, config.node_height)
    } else {
        (config.node_height, config.node_width)
    };
    let layer_pitch = long_extent + config.rank_spacing;
    let slot_pitch = cross_extent + config.node_spacing;

    let span = |count: usize| -> f32 {
        if count == 0 {
            0.0
        } else {
            count as f32 * cross_extent + (count - 1) as f32 * config.node_spacing
        }
    };
    let widest = layers.iter().map(|layer| span(layer.len())).fold(0.0, f32::max);

    for (rank, layer) in layers.iter().enumerate() {
        let long = config.margin + rank as f32 * layer_pitch;
        let cross_start = config.margin + (widest - span(layer.len())) / 2.0;
        for (slot, &idx) in layer.iter().enumerate() {
            let cross = cross_start + slot as f32 * slot_pitch;
            let Some((_, node)) = graph.nodes.get_index_mut(idx) else {
                continue;
            };
            node.rank = Some(rank);
            node.position = Some(if horizontal {
                Point::new(long, cross)
            } else {
                Point::new(cross, long)
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Direction, PortSide};
    use crate::parser::parse;

    fn laid_out(input: &str) -> Graph {
        let mut graph = parse(input);
        compute_layout(&mut graph, &LayoutConfig::default());
        graph
    }

    fn position(graph: &Graph, id: &str) -> Point {
        graph.nodes[id].position.expect("node should be placed")
    }

    #[test]
    fn dag_layers_increase_along_edges() {
        let graph = laid_out("flowchart LR\nA --> B\nA --> C\nB --> D\nC --> D\nD --> E");
        for edge in &graph.edges {
            let from = position(&graph, &edge.from);
            let to = position(&graph, &edge.to);
            assert!(from.x < to.x, "{} -> {}", edge.from, edge.to);
            assert!(graph.nodes[&edge.from].rank < graph.nodes[&edge.to].rank);
        }
    }

    #[test]
    fn cyclic_nodes_are_omitted() {
        let graph = laid_out("A --> B\nB --> C\nC --> B");
        assert!(graph.nodes["A"].is_placed());
        assert!(!graph.nodes["B"].is_placed());
        assert!(!graph.nodes["C"].is_placed());
        assert_eq!(graph.placed_nodes().count(), 1);
        assert!(graph.edges.iter().all(|edge| edge.exit_port.is_none()));
    }

    #[test]
    fn top_down_is_transpose_of_left_right() {
        let source = "A --> B\nA --> C";
        let td = laid_out(source);
        let lr = laid_out(&format!("flowchart LR\n{source}"));
        let config = LayoutConfig::default();

        assert_eq!(position(&td, "A").y, config.margin);
        assert_eq!(
            position(&td, "B").y,
            config.margin + config.node_height + config.rank_spacing
        );
        assert_eq!(position(&td, "B").y, position(&td, "C").y);
        assert!(position(&td, "B").x < position(&td, "C").x);

        assert_eq!(position(&lr, "A").x, config.margin);
        assert_eq!(
            position(&lr, "B").x,
            config.margin + config.node_width + config.rank_spacing
        );
        assert_eq!(position(&lr, "B").x, position(&lr, "C").x);
        assert!(position(&lr, "B").y < position(&lr, "C").y);
    }

    #[test]
    fn narrow_layers_are_centered() {
        let graph = laid_out("flowchart LR\nA --> B\nA --> C");
        let a = position(&graph, "A");
        let b = position(&graph, "B");
        let c = position(&graph, "C");
        assert!((a.y - (b.y + c.y) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn fan_out_ports_are_evenly_spaced() {
        let graph = laid_out("flowchart LR\nA --> B\nA --> C\nA --> D");
        let offsets: Vec<f32> = graph.edges.iter().map(|edge| edge.exit_offset.y).collect();
        assert_eq!(offsets, vec![-12.0, 0.0, 12.0]);
        for edge in &graph.edges {
            assert_eq!(edge.exit_port, Some(PortSide::Right));
            assert_eq!(edge.entry_port, Some(PortSide::Left));
            assert_eq!(edge.entry_offset, Point::ZERO);
        }
    }

    #[test]
    fn fan_in_ports_use_entry_side() {
        let graph = laid_out("A --> C\nB --> C");
        assert_eq!(graph.direction, Direction::TopDown);
        let offsets: Vec<Point> = graph.edges.iter().map(|edge| edge.entry_offset).collect();
        assert_eq!(offsets, vec![Point::new(-20.0, 0.0), Point::new(20.0, 0.0)]);
        assert!(graph.edges.iter().all(|e| e.entry_port == Some(PortSide::Top)));
    }

    #[test]
    fn rerun_is_deterministic() {
        let mut graph = laid_out("A --> B\nB --> C\nA --> C");
        let first: Vec<Option<Point>> = graph.nodes.values().map(|n| n.position).collect();
        graph.nodes["A"].position = Some(Point::new(999.0, 999.0));
        compute_layout(&mut graph, &LayoutConfig::default());
        let second: Vec<Option<Point>> = graph.nodes.values().map(|n| n.position).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_graph_is_a_no_op() {
        let mut graph = Graph::new();
        compute_layout(&mut graph, &LayoutConfig::default());
        assert!(graph.is_empty());
    }
}
