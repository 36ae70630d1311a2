use std::path::Path;

use flowscribe::color::Color;
use flowscribe::geometry::Scene;
use flowscribe::ir::{Arrowhead, EdgeStyle, Graph, NodeShape};
use flowscribe::{LayoutConfig, Theme, compute_layout, parse, render_svg, resolve_scene};
use pretty_assertions::assert_eq;

fn assert_valid_svg(svg: &str, fixture: &str) {
    assert!(svg.starts_with("<svg"), "{fixture}: missing <svg tag");
    assert!(svg.ends_with("</svg>"), "{fixture}: missing </svg tag");
}

fn read_fixture(rel: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(rel);
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("fixture {rel}: {err}"))
}

fn pipeline(rel: &str) -> (Graph, Scene) {
    let config = LayoutConfig::default();
    let mut graph = parse(&read_fixture(rel));
    compute_layout(&mut graph, &config);
    let scene = resolve_scene(&graph, &config);
    (graph, scene)
}

#[test]
fn render_all_fixtures() {
    // Keep this list explicit so new fixtures must be added intentionally.
    let candidates = [
        "flowchart/basic.mmd",
        "flowchart/cycles.mmd",
        "flowchart/edges.mmd",
        "flowchart/labels.mmd",
        "flowchart/notes.mmd",
        "flowchart/styles.mmd",
        "flowchart/subgraph.mmd",
    ];

    for theme in [Theme::mermaid_default(), Theme::modern()] {
        for rel in candidates {
            let (_, scene) = pipeline(rel);
            let svg = render_svg(&scene, &theme);
            assert_valid_svg(&svg, rel);
        }
    }
}

#[test]
fn basic_shapes_and_labels() {
    let (graph, scene) = pipeline("flowchart/basic.mmd");
    let shapes: Vec<(&str, NodeShape, &str)> = graph
        .nodes
        .values()
        .map(|n| (n.id.as_str(), n.shape, n.label.as_str()))
        .collect();
    assert_eq!(
        shapes,
        vec![
            ("A", NodeShape::Rectangle, "Start"),
            ("B", NodeShape::Diamond, "Ready?"),
            ("C", NodeShape::Stadium, "Ship"),
            ("D", NodeShape::DoubleRect, "Fix"),
        ]
    );
    let labels: Vec<Option<&str>> = scene
        .edges
        .iter()
        .map(|e| e.label.as_ref().map(|l| l.text.as_str()))
        .collect();
    assert_eq!(labels, vec![None, Some("yes"), Some("no")]);
    assert_eq!(scene.nodes.len(), 4);
}

#[test]
fn edge_variants_and_fan_out_ports() {
    let (graph, scene) = pipeline("flowchart/edges.mmd");
    let kinds: Vec<(EdgeStyle, Arrowhead)> =
        graph.edges.iter().map(|e| (e.style, e.arrowhead)).collect();
    assert_eq!(
        kinds,
        vec![
            (EdgeStyle::Solid, Arrowhead::Arrow),
            (EdgeStyle::Solid, Arrowhead::None),
            (EdgeStyle::Dashed, Arrowhead::Arrow),
            (EdgeStyle::Thick, Arrowhead::Arrow),
            (EdgeStyle::Solid, Arrowhead::Circle),
            (EdgeStyle::Solid, Arrowhead::Cross),
            (EdgeStyle::Solid, Arrowhead::Arrow),
            (EdgeStyle::Solid, Arrowhead::Arrow),
            (EdgeStyle::Solid, Arrowhead::Arrow),
        ]
    );
    assert_eq!(graph.edges[6].label.as_deref(), Some("text"));

    // Seven edges leave A's bottom side at distinct, ordered offsets.
    let exits: Vec<f32> = graph.edges[..7].iter().map(|e| e.exit_offset.x).collect();
    assert!(exits.windows(2).all(|pair| pair[0] < pair[1]), "{exits:?}");
    assert!(exits[3].abs() < 1e-3);

    assert_eq!(scene.edges.len(), 9);
    assert!(scene.edges[1].arrow.is_none());
    let rank_i = graph.nodes["I"].rank;
    assert_eq!(rank_i, Some(2));
}

#[test]
fn cycles_leave_members_unplaced() {
    let (graph, scene) = pipeline("flowchart/cycles.mmd");
    let unplaced: Vec<&str> = graph
        .nodes
        .values()
        .filter(|n| !n.is_placed())
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(unplaced, vec!["Loop1", "Loop2", "Tail", "Self"]);
    let drawn: Vec<(&str, &str)> = scene
        .edges
        .iter()
        .map(|e| (e.from.as_str(), e.to.as_str()))
        .collect();
    assert_eq!(drawn, vec![("Root", "Free")]);
}

#[test]
fn class_styles_override_inline_styles() {
    let (graph, _) = pipeline("flowchart/styles.mmd");
    let red = Color::rgb(0xff, 0, 0);
    assert_eq!(graph.nodes["A"].fill, red);
    assert_eq!(graph.nodes["B"].fill, red);
    assert_eq!(graph.nodes["B"].border, Color::rgb(0x99, 0, 0));
    assert_eq!(graph.nodes["B"].border_width, 3.0);
    assert_eq!(graph.nodes["B"].text_color, Color::rgb(0xff, 0xff, 0xff));
    assert_eq!(graph.nodes["C"].fill.to_hex(), "#ececff");

    assert_eq!(graph.edges.len(), 3);
    assert_eq!(graph.edges[1].color.to_hex(), "#333333");
    assert_eq!(graph.edges[2].color.to_hex(), "#123456");
    assert_eq!(graph.edges[2].stroke_width, 2.0);
    assert!(graph.edges.iter().all(|e| e.style == EdgeStyle::Dashed));
}

#[test]
fn notes_are_ignored() {
    let (graph, _) = pipeline("flowchart/notes.mmd");
    let ids: Vec<&str> = graph.nodes.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    assert_eq!(graph.edges.len(), 2);
}

#[test]
fn subgraph_frames_enclose_members() {
    let (graph, scene) = pipeline("flowchart/subgraph.mmd");
    let labels: Vec<&str> = scene.frames.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["Frontend", "Backend", "Data"]);
    assert_eq!(graph.nodes["replica"].subgraph, None);

    for frame in &scene.frames {
        assert!(frame.dashed);
        for id in &frame.members {
            let bounds = graph.nodes[id.as_str()].bounds().expect("member placed");
            assert!(frame.bounds.x < bounds.x && frame.bounds.right() > bounds.right());
            assert!(frame.bounds.y < bounds.y && frame.bounds.bottom() > bounds.bottom());
        }
    }
}

#[test]
fn long_labels_extend_their_segment() {
    let (_, scene) = pipeline("flowchart/labels.mmd");
    let config = LayoutConfig::default();
    for edge in scene.edges.iter().filter(|e| e.label.is_some()) {
        let label = edge.label.as_ref().expect("label");
        if label.text == "respond" {
            continue;
        }
        assert!(edge.is_label_segment_extended(), "{}", label.text);
        let needed = label.width + config.flowchart.edge_label_padding;
        assert!((edge.label_segment.length() - needed).abs() < 1e-2);
        let mid = edge.middle_segment().midpoint();
        let extended = edge.label_segment.midpoint();
        assert!((mid.x - extended.x).abs() < 1e-3 && (mid.y - extended.y).abs() < 1e-3);
    }
}

#[test]
fn layout_is_deterministic() {
    let (first, first_scene) = pipeline("flowchart/subgraph.mmd");
    let (second, second_scene) = pipeline("flowchart/subgraph.mmd");
    let positions = |graph: &Graph| {
        graph
            .nodes
            .values()
            .map(|n| (n.id.clone(), n.position))
            .collect::<Vec<_>>()
    };
    assert_eq!(positions(&first), positions(&second));
    assert_eq!(first_scene, second_scene);
}
