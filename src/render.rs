use crate::color::Color;
use crate::config::RenderConfig;
use crate::geometry::{ArrowGlyph, EdgeGeometry, EdgeLabel, NodeGeometry, Outline, Scene, SubgraphFrame};
use crate::ir::{EdgeStyle, Point};
use crate::theme::Theme;
use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

const MIN_CANVAS: f32 = 200.0;
const LABEL_PAD_X: f32 = 4.0;
const LABEL_PAD_Y: f32 = 2.0;

/// Serializes a resolved scene as a standalone SVG document.
pub fn render_svg(scene: &Scene, theme: &Theme) -> String {
    let mut svg = String::new();
    let width = scene.width.max(MIN_CANVAS);
    let height = scene.height.max(MIN_CANVAS);

    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">"
    );
    let _ = write!(
        svg,
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        escape_xml(&theme.background)
    );

    for frame in &scene.frames {
        push_frame(&mut svg, frame, theme);
    }
    for edge in &scene.edges {
        push_edge(&mut svg, edge, theme);
    }
    for node in &scene.nodes {
        push_node(&mut svg, node, theme);
    }

    svg.push_str("</svg>");
    svg
}

fn push_frame(svg: &mut String, frame: &SubgraphFrame, theme: &Theme) {
    let b = frame.bounds;
    let dash = if frame.dashed { " stroke-dasharray=\"6 4\"" } else { "" };
    let _ = write!(
        svg,
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"{dash}/>",
        b.x,
        b.y,
        b.width,
        b.height,
        escape_xml(&theme.cluster_background),
        escape_xml(&theme.cluster_border),
    );
    if !frame.label.is_empty() {
        let font_size = theme.font_size * 0.75;
        let _ = write!(
            svg,
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{font_size:.2}\" fill=\"{}\" dominant-baseline=\"hanging\">{}</text>",
            frame.label_anchor.x,
            frame.label_anchor.y,
            escape_xml(&theme.font_family),
            escape_xml(&theme.primary_text_color),
            escape_xml(&frame.label)
        );
    }
}

fn push_edge(svg: &mut String, edge: &EdgeGeometry, theme: &Theme) {
    let stroke = paint("stroke", edge.color);
    let width = effective_stroke_width(edge.style, edge.stroke_width);
    let dash = match edge.style {
        EdgeStyle::Dashed => " stroke-dasharray=\"6 4\"",
        EdgeStyle::Dotted => " stroke-dasharray=\"2 3\"",
        _ => "",
    };

    let _ = write!(
        svg,
        "<path d=\"{}\" fill=\"none\" {stroke} stroke-width=\"{width:.2}\"{dash}/>",
        points_to_path(&edge.points)
    );

    if edge.is_label_segment_extended() {
        let segment = edge.label_segment;
        let _ = write!(
            svg,
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" {stroke} stroke-width=\"{width:.2}\"{dash}/>",
            segment.start.x, segment.start.y, segment.end.x, segment.end.y
        );
    }

    if let Some(arrow) = &edge.arrow {
        push_arrow(svg, arrow, edge.color, width);
    }

    if let Some(label) = &edge.label {
        push_edge_label(svg, label, theme);
    }
}

fn effective_stroke_width(style: EdgeStyle, width: f32) -> f32 {
    match style {
        EdgeStyle::Bold => width.max(2.0),
        EdgeStyle::Thick => width.max(3.5),
        _ => width,
    }
}

fn push_arrow(svg: &mut String, arrow: &ArrowGlyph, color: Color, width: f32) {
    let stroke = paint("stroke", color);
    match arrow {
        ArrowGlyph::Chevron {
            tip,
            left,
            right,
            filled,
        } => {
            let fill = if *filled {
                paint("fill", color)
            } else {
                "fill=\"none\"".to_string()
            };
            let _ = write!(
                svg,
                "<path d=\"M {:.2} {:.2} L {:.2} {:.2} L {:.2} {:.2}{}\" {fill} {stroke} stroke-width=\"{width:.2}\"/>",
                left.x,
                left.y,
                tip.x,
                tip.y,
                right.x,
                right.y,
                if *filled { " Z" } else { "" }
            );
        }
        ArrowGlyph::Circle { center, radius } => {
            let _ = write!(
                svg,
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{radius:.2}\" fill=\"none\" {stroke} stroke-width=\"{width:.2}\"/>",
                center.x, center.y
            );
        }
        ArrowGlyph::Cross { strokes } => {
            for segment in strokes {
                let _ = write!(
                    svg,
                    "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" {stroke} stroke-width=\"{width:.2}\"/>",
                    segment.start.x, segment.start.y, segment.end.x, segment.end.y
                );
            }
        }
    }
}

fn push_edge_label(svg: &mut String, label: &EdgeLabel, theme: &Theme) {
    let x = label.anchor.x - label.width / 2.0 - LABEL_PAD_X;
    let y = label.anchor.y - label.height / 2.0 - LABEL_PAD_Y;
    let _ = write!(
        svg,
        "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
        label.width + 2.0 * LABEL_PAD_X,
        label.height + 2.0 * LABEL_PAD_Y,
        escape_xml(&theme.edge_label_background)
    );
    push_text(
        svg,
        label.anchor,
        &label.lines,
        label.font_size,
        &theme.font_family,
        &theme.primary_text_color,
    );
}

fn push_node(svg: &mut String, node: &NodeGeometry, theme: &Theme) {
    let style = format!(
        "{} {} stroke-width=\"{:.2}\"",
        paint("fill", node.fill),
        paint("stroke", node.border),
        node.border_width
    );
    match &node.outline {
        Outline::Rect { bounds } => {
            let _ = write!(
                svg,
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" {style}/>",
                bounds.x, bounds.y, bounds.width, bounds.height
            );
        }
        Outline::RoundedRect { bounds, radius } | Outline::Stadium { bounds, radius } => {
            let _ = write!(
                svg,
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{radius:.2}\" ry=\"{radius:.2}\" {style}/>",
                bounds.x, bounds.y, bounds.width, bounds.height
            );
        }
        Outline::Polygon { points } => {
            let coords = points
                .iter()
                .map(|p| format!("{:.2},{:.2}", p.x, p.y))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = write!(svg, "<polygon points=\"{coords}\" {style}/>");
        }
        Outline::Ellipse { center, rx, ry } => {
            let _ = write!(
                svg,
                "<ellipse cx=\"{:.2}\" cy=\"{:.2}\" rx=\"{rx:.2}\" ry=\"{ry:.2}\" {style}/>",
                center.x, center.y
            );
        }
        Outline::DoubleRect { outer, inner } => {
            for rect in [outer, inner] {
                let _ = write!(
                    svg,
                    "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" {style}/>",
                    rect.x, rect.y, rect.width, rect.height
                );
            }
        }
    }

    push_text(
        svg,
        node.label_anchor,
        &node.label_lines,
        node.font_size,
        &theme.font_family,
        &node.text_color.to_hex(),
    );
}

fn push_text(svg: &mut String, anchor: Point, lines: &[String], font_size: f32, family: &str, fill: &str) {
    let line_height = font_size * 1.2;
    let first_dy = -(lines.len().saturating_sub(1) as f32) * line_height / 2.0;
    let _ = write!(
        svg,
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{font_size:.2}\" fill=\"{}\">",
        anchor.x,
        anchor.y,
        escape_xml(family),
        escape_xml(fill)
    );
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { first_dy } else { line_height };
        let _ = write!(
            svg,
            "<tspan x=\"{:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            anchor.x,
            escape_xml(line)
        );
    }
    svg.push_str("</text>");
}

fn paint(attr: &str, color: Color) -> String {
    if color.is_opaque() {
        format!("{attr}=\"{}\"", color.to_hex())
    } else {
        format!(
            "{attr}=\"{}\" {attr}-opacity=\"{:.3}\"",
            color.to_hex(),
            color.opacity()
        )
    }
}

fn points_to_path(points: &[Point]) -> String {
    let mut d = String::new();
    for (idx, point) in points.iter().enumerate() {
        let cmd = if idx == 0 { "M" } else { " L" };
        let _ = write!(d, "{cmd} {:.2} {:.2}", point.x, point.y);
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    if let Some(family) = theme.font_family.split(',').next() {
        opt.font_family = family.trim().trim_matches('"').to_string();
    }
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    tracing::debug!(path = %output.display(), "wrote png");
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig, _theme: &Theme) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
