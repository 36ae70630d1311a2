use crate::config::LayoutConfig;
use crate::ir::{Arrowhead, Direction, Edge, Graph, Point, Rect};
use crate::layout::routing::port_anchor;
use crate::layout::text::measure_text;

use super::{ArrowGlyph, EdgeGeometry, EdgeLabel, GeometryError, Segment};

pub fn resolve_edge(
    graph: &Graph,
    index: usize,
    config: &LayoutConfig,
) -> Result<EdgeGeometry, GeometryError> {
    let edge = graph
        .edges
        .get(index)
        .ok_or(GeometryError::UnknownEdge(index))?;
    let from_bounds = endpoint_bounds(graph, edge, &edge.from)?;
    let to_bounds = endpoint_bounds(graph, edge, &edge.to)?;
    let (Some(exit), Some(entry)) = (edge.exit_port, edge.entry_port) else {
        return Err(GeometryError::MissingPorts {
            from: edge.from.clone(),
            to: edge.to.clone(),
        });
    };

    let direction = graph.direction;
    let start = port_anchor(&from_bounds, exit, edge.exit_offset);
    let end = port_anchor(&to_bounds, entry, edge.entry_offset);
    let points = elbow_route(start, end, direction);
    let middle = Segment::new(points[1], points[2]);

    let flow = &config.flowchart;
    let (label_segment, label) = match edge.label.as_deref() {
        Some(text) => {
            let block = measure_text(text, flow.edge_label_font_size, config.label_line_height);
            let segment = extend_segment(
                middle,
                block.width + flow.edge_label_padding,
                cross_axis(direction),
            );
            let anchor = label_anchor(&segment, block.width, block.height, flow.edge_label_gap, direction);
            let label = EdgeLabel {
                text: text.to_string(),
                lines: block.lines,
                anchor,
                width: block.width,
                height: block.height,
                font_size: flow.edge_label_font_size,
            };
            (segment, Some(label))
        }
        None => (middle, None),
    };

    let arrow = arrow_glyph(
        edge.arrowhead,
        points[2],
        end,
        flow.arrow_size,
        flow_axis(direction),
    );

    Ok(EdgeGeometry {
        index,
        from: edge.from.clone(),
        to: edge.to.clone(),
        points,
        label_segment,
        label,
        arrow,
        color: edge.color,
        stroke_width: edge.stroke_width,
        style: edge.style,
    })
}

fn endpoint_bounds(graph: &Graph, edge: &Edge, id: &str) -> Result<Rect, GeometryError> {
    let node = graph.node(id).ok_or_else(|| GeometryError::MissingEndpoint {
        from: edge.from.clone(),
        to: edge.to.clone(),
        missing: id.to_string(),
    })?;
    node.bounds()
        .ok_or_else(|| GeometryError::NodeNotPlaced(id.to_string()))
}

/// Four-point orthogonal route with the bend line halfway between the
/// endpoints on the flow axis.
pub fn elbow_route(start: Point, end: Point, direction: Direction) -> Vec<Point> {
    if direction.is_horizontal() {
        let mid_x = (start.x + end.x) / 2.0;
        vec![start, Point::new(mid_x, start.y), Point::new(mid_x, end.y), end]
    } else {
        let mid_y = (start.y + end.y) / 2.0;
        vec![start, Point::new(start.x, mid_y), Point::new(end.x, mid_y), end]
    }
}

/// Lengthens `segment` symmetrically about its midpoint to `min_length`.
/// Segments already long enough are returned unchanged. A zero-length
/// segment grows along `fallback_axis`.
pub fn extend_segment(segment: Segment, min_length: f32, fallback_axis: Point) -> Segment {
    let length = segment.length();
    if length >= min_length {
        return segment;
    }
    let axis = if length > f32::EPSILON {
        Point::new(
            (segment.end.x - segment.start.x) / length,
            (segment.end.y - segment.start.y) / length,
        )
    } else {
        fallback_axis
    };
    let mid = segment.midpoint();
    let half = min_length / 2.0;
    Segment::new(
        Point::new(mid.x - axis.x * half, mid.y - axis.y * half),
        Point::new(mid.x + axis.x * half, mid.y + axis.y * half),
    )
}

/// Label box center beside the segment midpoint: to the right of a
/// left-to-right route's vertical middle segment, above a top-down route's
/// horizontal one.
fn label_anchor(segment: &Segment, width: f32, height: f32, gap: f32, direction: Direction) -> Point {
    let mid = segment.midpoint();
    if direction.is_horizontal() {
        Point::new(mid.x + width / 2.0 + gap, mid.y)
    } else {
        Point::new(mid.x, mid.y - height / 2.0 - gap)
    }
}

fn flow_axis(direction: Direction) -> Point {
    if direction.is_horizontal() {
        Point::new(1.0, 0.0)
    } else {
        Point::new(0.0, 1.0)
    }
}

fn cross_axis(direction: Direction) -> Point {
    if direction.is_horizontal() {
        Point::new(0.0, 1.0)
    } else {
        Point::new(1.0, 0.0)
    }
}

/// Glyph for `kind` at `tip`, oriented along `from -> tip`.
pub fn arrow_glyph(
    kind: Arrowhead,
    from: Point,
    tip: Point,
    size: f32,
    fallback_dir: Point,
) -> Option<ArrowGlyph> {
    let dx = tip.x - from.x;
    let dy = tip.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    let dir = if len > 1e-6 {
        Point::new(dx / len, dy / len)
    } else {
        fallback_dir
    };
    let half = size / 2.0;

    match kind {
        Arrowhead::None => None,
        Arrowhead::Arrow | Arrowhead::Open => {
            let base = Point::new(tip.x - dir.x * size, tip.y - dir.y * size);
            let perp = Point::new(-dir.y, dir.x);
            Some(ArrowGlyph::Chevron {
                tip,
                left: Point::new(base.x + perp.x * half, base.y + perp.y * half),
                right: Point::new(base.x - perp.x * half, base.y - perp.y * half),
                filled: kind == Arrowhead::Arrow,
            })
        }
        Arrowhead::Circle => Some(ArrowGlyph::Circle {
            center: Point::new(tip.x - dir.x * half, tip.y - dir.y * half),
            radius: half,
        }),
        Arrowhead::Cross => {
            let center = Point::new(tip.x - dir.x * half, tip.y - dir.y * half);
            let stroke = |axis: Point| {
                Segment::new(
                    Point::new(center.x - axis.x * half, center.y - axis.y * half),
                    Point::new(center.x + axis.x * half, center.y + axis.y * half),
                )
            };
            Some(ArrowGlyph::Cross {
                strokes: [stroke(rotate(dir, 45.0)), stroke(rotate(dir, -45.0))],
            })
        }
    }
}

fn rotate(vector: Point, degrees: f32) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Point::new(vector.x * cos - vector.y * sin, vector.x * sin + vector.y * cos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;
    use crate::layout::text::text_width;
    use crate::parser::parse;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn resolved(input: &str) -> (Graph, Vec<EdgeGeometry>) {
        let config = LayoutConfig::default();
        let mut graph = parse(input);
        compute_layout(&mut graph, &config);
        let edges = (0..graph.edges.len())
            .map(|index| resolve_edge(&graph, index, &config).unwrap())
            .collect();
        (graph, edges)
    }

    #[test]
    fn left_right_elbow_bends_halfway() {
        let route = elbow_route(Point::new(0.0, 10.0), Point::new(100.0, 50.0), Direction::LeftRight);
        assert_eq!(
            route,
            vec![
                Point::new(0.0, 10.0),
                Point::new(50.0, 10.0),
                Point::new(50.0, 50.0),
                Point::new(100.0, 50.0)
            ]
        );
        let route = elbow_route(Point::new(0.0, 0.0), Point::new(40.0, 80.0), Direction::TopDown);
        assert_eq!(route[1], Point::new(0.0, 40.0));
        assert_eq!(route[2], Point::new(40.0, 40.0));
    }

    #[test]
    fn short_label_segments_extend_symmetrically() {
        let (_, edges) = resolved("flowchart LR\nA -->|abc| B\nA -->|abc| B");
        let config = LayoutConfig::default();
        let needed = text_width("abc", config.flowchart.edge_label_font_size)
            + config.flowchart.edge_label_padding;

        assert_eq!(edges.len(), 2);
        for edge in &edges {
            let middle = edge.middle_segment();
            assert!(middle.length() < needed);
            assert!(edge.is_label_segment_extended());
            assert!(close(edge.label_segment.length(), needed));
            let mid = edge.label_segment.midpoint();
            assert!(close(mid.x, middle.midpoint().x));
            assert!(close(mid.y, middle.midpoint().y));
            assert!(edge.label_segment.length() >= needed - 1e-3);
        }
    }

    #[test]
    fn long_segments_are_left_alone() {
        let segment = Segment::new(Point::new(0.0, 0.0), Point::new(0.0, 100.0));
        assert_eq!(extend_segment(segment, 40.0, Point::new(0.0, 1.0)), segment);
        let grown = extend_segment(
            Segment::new(Point::new(0.0, 10.0), Point::new(0.0, 20.0)),
            30.0,
            Point::new(1.0, 0.0),
        );
        assert_eq!(grown, Segment::new(Point::new(0.0, 0.0), Point::new(0.0, 30.0)));
    }

    #[test]
    fn label_sits_beside_segment() {
        let (_, edges) = resolved("flowchart LR\nA -->|yes| B");
        let edge = &edges[0];
        let label = edge.label.as_ref().unwrap();
        let mid = edge.label_segment.midpoint();
        let gap = LayoutConfig::default().flowchart.edge_label_gap;
        assert!(close(label.anchor.x, mid.x + label.width / 2.0 + gap));
        assert!(close(label.anchor.y, mid.y));

        let (_, edges) = resolved("A -->|yes| B");
        let edge = &edges[0];
        let label = edge.label.as_ref().unwrap();
        let mid = edge.label_segment.midpoint();
        assert!(close(label.anchor.y, mid.y - label.height / 2.0 - gap));
    }

    #[test]
    fn arrow_chevron_points_along_flow() {
        let glyph = arrow_glyph(
            Arrowhead::Arrow,
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            8.0,
            Point::new(1.0, 0.0),
        );
        assert_eq!(
            glyph,
            Some(ArrowGlyph::Chevron {
                tip: Point::new(20.0, 0.0),
                left: Point::new(12.0, 4.0),
                right: Point::new(12.0, -4.0),
                filled: true,
            })
        );
        let open = arrow_glyph(Arrowhead::Open, Point::ZERO, Point::new(0.0, 10.0), 8.0, Point::new(0.0, 1.0));
        assert!(matches!(open, Some(ArrowGlyph::Chevron { filled: false, .. })));
        assert_eq!(arrow_glyph(Arrowhead::None, Point::ZERO, Point::new(5.0, 0.0), 8.0, Point::new(1.0, 0.0)), None);
    }

    #[test]
    fn circle_and_cross_glyphs() {
        let circle = arrow_glyph(Arrowhead::Circle, Point::ZERO, Point::new(0.0, 20.0), 8.0, Point::new(0.0, 1.0));
        assert_eq!(
            circle,
            Some(ArrowGlyph::Circle {
                center: Point::new(0.0, 16.0),
                radius: 4.0
            })
        );

        let Some(ArrowGlyph::Cross { strokes }) =
            arrow_glyph(Arrowhead::Cross, Point::ZERO, Point::new(20.0, 0.0), 8.0, Point::new(1.0, 0.0))
        else {
            panic!("expected cross");
        };
        for stroke in strokes {
            assert!(close(stroke.length(), 8.0));
            let mid = stroke.midpoint();
            assert!(close(mid.x, 16.0) && close(mid.y, 0.0));
            let dx = (stroke.end.x - stroke.start.x).abs();
            let dy = (stroke.end.y - stroke.start.y).abs();
            assert!(close(dx, dy), "stroke should be diagonal");
        }
    }

    #[test]
    fn degenerate_direction_uses_fallback() {
        let glyph = arrow_glyph(Arrowhead::Arrow, Point::new(5.0, 5.0), Point::new(5.0, 5.0), 8.0, Point::new(0.0, 1.0));
        assert_eq!(
            glyph,
            Some(ArrowGlyph::Chevron {
                tip: Point::new(5.0, 5.0),
                left: Point::new(1.0, -3.0),
                right: Point::new(9.0, -3.0),
                filled: true,
            })
        );
    }

    #[test]
    fn edge_without_ports_is_an_error() {
        let graph = parse("A --> B");
        let result = resolve_edge(&graph, 0, &LayoutConfig::default());
        assert!(matches!(result, Err(GeometryError::NodeNotPlaced(_))));
        let result = resolve_edge(&graph, 5, &LayoutConfig::default());
        assert_eq!(result, Err(GeometryError::UnknownEdge(5)));
    }
}
