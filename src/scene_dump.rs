use crate::geometry::{EdgeLabel, Scene, Segment, SubgraphFrame};
use crate::ir::Graph;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flattened, stable JSON view of a laid-out graph and its scene.
#[derive(Debug, Serialize)]
pub struct SceneDump {
    pub direction: String,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    /// Nodes left without a position (cycles and their descendants).
    pub unplaced: Vec<String>,
    pub edges: Vec<EdgeDump>,
    pub frames: Vec<SubgraphFrame>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub shape: String,
    pub rank: Option<usize>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub label_lines: Vec<String>,
    pub subgraph: Option<String>,
    pub fill: String,
    pub border: String,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub style: String,
    pub arrowhead: String,
    pub points: Vec<[f32; 2]>,
    pub label_segment: Segment,
    pub label: Option<EdgeLabel>,
}

impl SceneDump {
    pub fn from_scene(scene: &Scene, graph: &Graph) -> Self {
        let nodes = scene
            .nodes
            .iter()
            .map(|node| {
                let source = graph.node(&node.id);
                NodeDump {
                    id: node.id.clone(),
                    shape: source
                        .map(|n| format!("{:?}", n.shape))
                        .unwrap_or_default(),
                    rank: source.and_then(|n| n.rank),
                    x: node.bounds.x,
                    y: node.bounds.y,
                    width: node.bounds.width,
                    height: node.bounds.height,
                    font_size: node.font_size,
                    label_lines: node.label_lines.clone(),
                    subgraph: source.and_then(|n| n.subgraph.clone()),
                    fill: node.fill.to_hex(),
                    border: node.border.to_hex(),
                }
            })
            .collect();

        let unplaced = graph
            .nodes
            .values()
            .filter(|node| !node.is_placed())
            .map(|node| node.id.clone())
            .collect();

        let edges = scene
            .edges
            .iter()
            .filter_map(|geometry| {
                let edge = graph.edges.get(geometry.index)?;
                Some(EdgeDump {
                    index: geometry.index,
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    style: format!("{:?}", edge.style),
                    arrowhead: format!("{:?}", edge.arrowhead),
                    points: geometry.points.iter().map(|p| [p.x, p.y]).collect(),
                    label_segment: geometry.label_segment,
                    label: geometry.label.clone(),
                })
            })
            .collect();

        SceneDump {
            direction: format!("{:?}", graph.direction),
            width: scene.width,
            height: scene.height,
            nodes,
            unplaced,
            edges,
            frames: scene.frames.clone(),
        }
    }
}

pub fn scene_dump_json(scene: &Scene, graph: &Graph) -> anyhow::Result<String> {
    let dump = SceneDump::from_scene(scene, graph);
    Ok(serde_json::to_string_pretty(&dump)?)
}

pub fn write_scene_dump(path: &Path, scene: &Scene, graph: &Graph) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = SceneDump::from_scene(scene, graph);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::geometry::resolve_scene;
    use crate::layout::compute_layout;
    use crate::parser::parse;

    #[test]
    fn dump_lists_unplaced_nodes_and_edge_indices() {
        let config = LayoutConfig::default();
        let mut graph = parse("A --> B\nB --> C\nC --> B\nA -->|again| D");
        compute_layout(&mut graph, &config);
        let scene = resolve_scene(&graph, &config);
        let dump = SceneDump::from_scene(&scene, &graph);

        assert_eq!(dump.unplaced, vec!["B".to_string(), "C".to_string()]);
        let indices: Vec<usize> = dump.edges.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![3]);
        assert_eq!(dump.edges[0].label.as_ref().map(|l| l.text.as_str()), Some("again"));
        assert_eq!(dump.nodes[0].rank, Some(0));

        let json = scene_dump_json(&scene, &graph).unwrap();
        assert!(json.contains("\"direction\": \"TopDown\""));
    }
}
