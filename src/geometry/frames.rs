use crate::config::LayoutConfig;
use crate::ir::{Graph, Point, Rect};

use super::SubgraphFrame;

/// One dashed frame per distinct subgraph label among placed nodes, in
/// first-appearance order. Labels whose members are all unplaced get no
/// frame.
pub fn resolve_frames(graph: &Graph, config: &LayoutConfig) -> Vec<SubgraphFrame> {
    let margin = config.flowchart.subgraph_margin;
    let inset = config.flowchart.subgraph_label_inset;
    let mut frames = Vec::new();

    for label in graph.subgraph_labels() {
        let mut bounds: Option<Rect> = None;
        let mut members = Vec::new();
        for node in graph.placed_nodes() {
            if node.subgraph.as_deref() != Some(label) {
                continue;
            }
            let Some(node_bounds) = node.bounds() else {
                continue;
            };
            bounds = Some(bounds.map_or(node_bounds, |current| current.union(&node_bounds)));
            members.push(node.id.clone());
        }
        let Some(bounds) = bounds else {
            continue;
        };
        let bounds = bounds.expand(margin);
        frames.push(SubgraphFrame {
            label: label.to_string(),
            bounds,
            label_anchor: Point::new(bounds.x + inset, bounds.y + inset),
            dashed: true,
            members,
        });
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;
    use crate::parser::parse;

    fn frames_for(input: &str) -> (Graph, Vec<SubgraphFrame>) {
        let config = LayoutConfig::default();
        let mut graph = parse(input);
        compute_layout(&mut graph, &config);
        let frames = resolve_frames(&graph, &config);
        (graph, frames)
    }

    #[test]
    fn frame_encloses_members_with_margin() {
        let (graph, frames) = frames_for("A --> B\nsubgraph Work\nB --> C\nend");
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.label, "Work");
        assert_eq!(frame.members, vec!["C".to_string()]);
        assert!(frame.dashed);

        let margin = LayoutConfig::default().flowchart.subgraph_margin;
        let c = graph.nodes["C"].bounds().unwrap();
        assert_eq!(frame.bounds, c.expand(margin));
        assert_eq!(frame.label_anchor, Point::new(frame.bounds.x + 6.0, frame.bounds.y + 6.0));
    }

    #[test]
    fn frames_follow_first_appearance_and_skip_unplaced() {
        let input = "subgraph Late\nX --> Y\nend\nsubgraph Loop\nP --> Q\nQ --> P\nend\nsubgraph Early\nZ\nend";
        let (_, frames) = frames_for(input);
        let labels: Vec<&str> = frames.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["Late", "Early"]);
        assert_eq!(frames[0].members, vec!["X".to_string(), "Y".to_string()]);
    }

    #[test]
    fn no_subgraphs_no_frames() {
        let (_, frames) = frames_for("A --> B");
        assert!(frames.is_empty());
    }
}
