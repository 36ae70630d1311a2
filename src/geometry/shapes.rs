use crate::config::LayoutConfig;
use crate::ir::{Node, NodeShape, Point, Rect};
use crate::layout::text::{fit_font_size, split_lines};

use super::{GeometryError, NodeGeometry, Outline};

pub fn resolve_node(node: &Node, config: &LayoutConfig) -> Result<NodeGeometry, GeometryError> {
    let bounds = node
        .bounds()
        .ok_or_else(|| GeometryError::NodeNotPlaced(node.id.clone()))?;
    if !bounds.is_finite() || bounds.width <= 0.0 || bounds.height <= 0.0 {
        return Err(GeometryError::DegenerateBounds {
            id: node.id.clone(),
            width: bounds.width,
            height: bounds.height,
        });
    }
    let outline = shape_outline(node.shape, bounds, config);
    Ok(node_geometry(node, bounds, outline, config))
}

/// Bounding-rectangle rendition used when `resolve_node` fails on a placed
/// node.
pub(super) fn fallback_node(node: &Node, config: &LayoutConfig) -> Option<NodeGeometry> {
    let bounds = node.bounds()?;
    if !bounds.is_finite() {
        return None;
    }
    let bounds = Rect::new(
        bounds.x,
        bounds.y,
        bounds.width.max(0.0),
        bounds.height.max(0.0),
    );
    Some(node_geometry(node, bounds, Outline::Rect { bounds }, config))
}

fn node_geometry(node: &Node, bounds: Rect, outline: Outline, config: &LayoutConfig) -> NodeGeometry {
    let flow = &config.flowchart;
    let font_size = fit_font_size(
        &node.label,
        bounds.width - flow.node_text_padding,
        flow.node_font_min,
        flow.node_font_max,
    );
    NodeGeometry {
        id: node.id.clone(),
        bounds,
        outline,
        label: node.label.clone(),
        label_lines: split_lines(&node.label),
        label_anchor: bounds.center(),
        font_size,
        fill: node.fill,
        border: node.border,
        border_width: node.border_width,
        text_color: node.text_color,
    }
}

pub fn shape_outline(shape: NodeShape, bounds: Rect, config: &LayoutConfig) -> Outline {
    let flow = &config.flowchart;
    match shape {
        NodeShape::Rectangle => Outline::Rect { bounds },
        NodeShape::RoundRect => Outline::RoundedRect {
            bounds,
            radius: flow
                .corner_radius
                .min(bounds.width / 2.0)
                .min(bounds.height / 2.0),
        },
        NodeShape::Diamond => {
            let center = bounds.center();
            Outline::Polygon {
                points: vec![
                    Point::new(center.x, bounds.y),
                    Point::new(bounds.right(), center.y),
                    Point::new(center.x, bounds.bottom()),
                    Point::new(bounds.x, center.y),
                ],
            }
        }
        NodeShape::Circle => Outline::Ellipse {
            center: bounds.center(),
            rx: bounds.width / 2.0,
            ry: bounds.height / 2.0,
        },
        NodeShape::Stadium => Outline::Stadium {
            bounds,
            radius: bounds.width.min(bounds.height) / 2.0,
        },
        NodeShape::DoubleRect => Outline::DoubleRect {
            outer: bounds,
            inner: bounds.inset(flow.double_rect_inset),
        },
        NodeShape::Hexagon => Outline::Polygon {
            points: hexagon_points(bounds),
        },
    }
}

/// Six vertices at 60° steps around the center, starting at the right-hand
/// corner, scaled to the box.
pub fn hexagon_points(bounds: Rect) -> Vec<Point> {
    let center = bounds.center();
    let rx = bounds.width / 2.0;
    let ry = bounds.height / 2.0;
    (0..6)
        .map(|step| {
            let angle = (step as f32 * 60.0).to_radians();
            Point::new(center.x + rx * angle.cos(), center.y + ry * angle.sin())
        })
        .collect()
}
