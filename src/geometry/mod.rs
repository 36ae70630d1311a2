mod edges;
mod frames;
mod shapes;

pub use edges::{arrow_glyph, elbow_route, extend_segment, resolve_edge};
pub use frames::resolve_frames;
pub use shapes::{hexagon_points, resolve_node, shape_outline};

use serde::Serialize;

use crate::color::Color;
use crate::config::LayoutConfig;
use crate::ir::{EdgeStyle, Graph, Point, Rect};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("node `{0}` has no position")]
    NodeNotPlaced(String),

    #[error("node `{id}` has degenerate bounds {width}x{height}")]
    DegenerateBounds { id: String, width: f32, height: f32 },

    #[error("edge {from} -> {to} references unknown node `{missing}`")]
    MissingEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    #[error("no edge at index {0}")]
    UnknownEdge(usize),

    #[error("edge {from} -> {to} has no assigned ports")]
    MissingPorts { from: String, to: String },
}

/// Drawable outline of a node, in absolute coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outline {
    Rect { bounds: Rect },
    RoundedRect { bounds: Rect, radius: f32 },
    Polygon { points: Vec<Point> },
    Ellipse { center: Point, rx: f32, ry: f32 },
    /// Straight sides with semicircular caps of `radius`.
    Stadium { bounds: Rect, radius: f32 },
    DoubleRect { outer: Rect, inner: Rect },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGeometry {
    pub id: String,
    pub bounds: Rect,
    pub outline: Outline,
    pub label: String,
    pub label_lines: Vec<String>,
    pub label_anchor: Point,
    pub font_size: f32,
    pub fill: Color,
    pub border: Color,
    pub border_width: f32,
    pub text_color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f32 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self) -> Point {
        Point::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeLabel {
    pub text: String,
    pub lines: Vec<String>,
    /// Center of the label box.
    pub anchor: Point,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArrowGlyph {
    /// Filled for closed arrows, stroked only for open ones.
    Chevron {
        tip: Point,
        left: Point,
        right: Point,
        filled: bool,
    },
    Circle { center: Point, radius: f32 },
    Cross { strokes: [Segment; 2] },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeGeometry {
    /// Index of the source edge in `Graph::edges`.
    pub index: usize,
    pub from: String,
    pub to: String,
    /// Elbow polyline: start, two bends, end.
    pub points: Vec<Point>,
    /// Middle segment of the route, lengthened symmetrically when a label
    /// needs more room than the bends leave.
    pub label_segment: Segment,
    pub label: Option<EdgeLabel>,
    pub arrow: Option<ArrowGlyph>,
    pub color: Color,
    pub stroke_width: f32,
    pub style: EdgeStyle,
}

impl EdgeGeometry {
    pub fn middle_segment(&self) -> Segment {
        Segment::new(self.points[1], self.points[2])
    }

    pub fn is_label_segment_extended(&self) -> bool {
        self.label_segment != self.middle_segment()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubgraphFrame {
    pub label: String,
    pub bounds: Rect,
    pub label_anchor: Point,
    pub dashed: bool,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeGeometry>,
    pub edges: Vec<EdgeGeometry>,
    pub frames: Vec<SubgraphFrame>,
}

/// Resolves drawable geometry for a laid-out graph. Unplaced nodes are
/// skipped; a node whose outline cannot be built falls back to its
/// bounding rectangle; an edge that cannot be routed is omitted.
pub fn resolve_scene(graph: &Graph, config: &LayoutConfig) -> Scene {
    let mut scene = Scene::default();

    for node in graph.placed_nodes() {
        match resolve_node(node, config) {
            Ok(geometry) => scene.nodes.push(geometry),
            Err(err) => {
                tracing::debug!(%err, "falling back to bounding rectangle");
                if let Some(geometry) = shapes::fallback_node(node, config) {
                    scene.nodes.push(geometry);
                }
            }
        }
    }

    for index in 0..graph.edges.len() {
        match resolve_edge(graph, index, config) {
            Ok(geometry) => scene.edges.push(geometry),
            Err(err) => tracing::debug!(%err, "omitting edge geometry"),
        }
    }

    scene.frames = resolve_frames(graph, config);
    let (width, height) = scene_extent(&scene, config.margin);
    scene.width = width;
    scene.height = height;
    scene
}

fn scene_extent(scene: &Scene, margin: f32) -> (f32, f32) {
    let mut bounds: Option<Rect> = None;
    let mut include = |rect: Rect| {
        if rect.is_finite() {
            bounds = Some(bounds.map_or(rect, |current| current.union(&rect)));
        }
    };

    for node in &scene.nodes {
        include(node.bounds);
    }
    for frame in &scene.frames {
        include(frame.bounds);
    }
    for edge in &scene.edges {
        for point in edge.points.iter().chain([&edge.label_segment.start, &edge.label_segment.end]) {
            include(Rect::new(point.x, point.y, 0.0, 0.0));
        }
        if let Some(label) = &edge.label {
            include(Rect::new(
                label.anchor.x - label.width / 2.0,
                label.anchor.y - label.height / 2.0,
                label.width,
                label.height,
            ));
        }
    }

    match bounds {
        Some(rect) => (
            (rect.right() + margin).max(0.0),
            (rect.bottom() + margin).max(0.0),
        ),
        None => (0.0, 0.0),
    }
}
