use indexmap::IndexMap;
use serde::Serialize;

use crate::color::Color;

pub const DEFAULT_NODE_WIDTH: f32 = 120.0;
pub const DEFAULT_NODE_HEIGHT: f32 = 48.0;
pub const DEFAULT_NODE_FILL: Color = Color::rgb(0xEC, 0xEC, 0xFF);
pub const DEFAULT_NODE_BORDER: Color = Color::rgb(0x93, 0x70, 0xDB);
pub const DEFAULT_TEXT_COLOR: Color = Color::rgb(0x33, 0x33, 0x33);
pub const DEFAULT_EDGE_COLOR: Color = Color::rgb(0x33, 0x33, 0x33);
pub const DEFAULT_BORDER_WIDTH: f32 = 1.0;
pub const DEFAULT_EDGE_WIDTH: f32 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Direction {
    #[default]
    TopDown,
    LeftRight,
}

impl Direction {
    /// `LR` selects left-to-right; every other token is top-to-bottom.
    pub fn from_token(token: &str) -> Self {
        if token.trim() == "LR" {
            Self::LeftRight
        } else {
            Self::TopDown
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftRight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn translate(self, by: Point) -> Self {
        Self::new(self.x + by.x, self.y + by.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_WIDTH, DEFAULT_NODE_HEIGHT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn inset(&self, amount: f32) -> Rect {
        Rect::new(
            self.x + amount,
            self.y + amount,
            (self.width - 2.0 * amount).max(0.0),
            (self.height - 2.0 * amount).max(0.0),
        )
    }

    pub fn expand(&self, margin: f32) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeShape {
    Rectangle,
    RoundRect,
    Diamond,
    Circle,
    Stadium,
    DoubleRect,
    Hexagon,
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    /// Top-left corner; `None` until layout places the node.
    pub position: Option<Point>,
    /// Layer assigned by layout.
    pub rank: Option<usize>,
    pub size: Size,
    pub fill: Color,
    pub border: Color,
    pub border_width: f32,
    pub text_color: Color,
    pub subgraph: Option<String>,
}

impl Node {
    pub fn new(id: &str, label: &str, shape: NodeShape, subgraph: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            shape,
            position: None,
            rank: None,
            size: Size::default(),
            fill: DEFAULT_NODE_FILL,
            border: DEFAULT_NODE_BORDER,
            border_width: DEFAULT_BORDER_WIDTH,
            text_color: DEFAULT_TEXT_COLOR,
            subgraph,
        }
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.position.map(|pos| Rect::from_origin_size(pos, self.size))
    }

    pub fn is_placed(&self) -> bool {
        self.position.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeStyle {
    Solid,
    Dashed,
    Dotted,
    Bold,
    Thick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Arrowhead {
    None,
    Arrow,
    Open,
    Cross,
    Circle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PortSide {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub color: Color,
    pub stroke_width: f32,
    pub style: EdgeStyle,
    pub arrowhead: Arrowhead,
    pub exit_port: Option<PortSide>,
    pub entry_port: Option<PortSide>,
    /// Offset of the exit point from the exit side's midpoint.
    pub exit_offset: Point,
    pub entry_offset: Point,
}

impl Edge {
    pub fn new(
        from: &str,
        to: &str,
        label: Option<String>,
        style: EdgeStyle,
        arrowhead: Arrowhead,
    ) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            label,
            color: DEFAULT_EDGE_COLOR,
            stroke_width: DEFAULT_EDGE_WIDTH,
            style,
            arrowhead,
            exit_port: None,
            entry_port: None,
            exit_offset: Point::ZERO,
            entry_offset: Point::ZERO,
        }
    }

    pub fn clear_ports(&mut self) {
        self.exit_port = None;
        self.entry_port = None;
        self.exit_offset = Point::ZERO;
        self.entry_offset = Point::ZERO;
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    pub direction: Direction,
    pub nodes: IndexMap<String, Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node for `id`, creating it on first reference. An existing
    /// node is returned unchanged; the first reference decides text, shape and
    /// subgraph.
    pub fn ensure_node(
        &mut self,
        id: &str,
        label: Option<&str>,
        shape: Option<NodeShape>,
        subgraph: Option<&str>,
    ) -> &mut Node {
        self.nodes.entry(id.to_string()).or_insert_with(|| {
            Node::new(
                id,
                label.unwrap_or(id),
                shape.unwrap_or(NodeShape::Rectangle),
                subgraph.map(str::to_string),
            )
        })
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn placed_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|node| node.is_placed())
    }

    /// Distinct subgraph labels in first-appearance order.
    pub fn subgraph_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for node in self.nodes.values() {
            if let Some(label) = node.subgraph.as_deref()
                && !labels.contains(&label)
            {
                labels.push(label);
            }
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_node_keeps_first_reference() {
        let mut graph = Graph::new();
        graph.ensure_node("A", Some("Start"), Some(NodeShape::Diamond), Some("G"));
        graph.ensure_node("A", Some("Other"), Some(NodeShape::Circle), None);
        let node = graph.node("A").unwrap();
        assert_eq!(node.label, "Start");
        assert_eq!(node.shape, NodeShape::Diamond);
        assert_eq!(node.subgraph.as_deref(), Some("G"));
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn nodes_keep_insertion_order() {
        let mut graph = Graph::new();
        for id in ["z", "a", "m"] {
            graph.ensure_node(id, None, None, None);
        }
        let ids: Vec<&str> = graph.nodes.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn direction_token() {
        assert_eq!(Direction::from_token("LR"), Direction::LeftRight);
        assert_eq!(Direction::from_token("TD"), Direction::TopDown);
        assert_eq!(Direction::from_token("RL"), Direction::TopDown);
    }

    #[test]
    fn rect_union_and_expand() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 10.0, 10.0);
        let u = a.union(&b).expand(2.0);
        assert_eq!(u, Rect::new(-2.0, -2.0, 34.0, 19.0));
    }
}
