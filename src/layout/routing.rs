use crate::ir::{Direction, Graph, Point, PortSide, Rect};

/// Exit and entry sides for every edge under `direction`.
pub(crate) fn port_sides(direction: Direction) -> (PortSide, PortSide) {
    if direction.is_horizontal() {
        (PortSide::Right, PortSide::Left)
    } else {
        (PortSide::Bottom, PortSide::Top)
    }
}

pub(crate) fn side_is_vertical(side: PortSide) -> bool {
    matches!(side, PortSide::Left | PortSide::Right)
}

pub(crate) fn side_midpoint(bounds: &Rect, side: PortSide) -> Point {
    let center = bounds.center();
    match side {
        PortSide::Left => Point::new(bounds.x, center.y),
        PortSide::Right => Point::new(bounds.right(), center.y),
        PortSide::Top => Point::new(center.x, bounds.y),
        PortSide::Bottom => Point::new(center.x, bounds.bottom()),
    }
}

/// Absolute port position: side midpoint shifted by the stored offset.
pub(crate) fn port_anchor(bounds: &Rect, side: PortSide, offset: Point) -> Point {
    side_midpoint(bounds, side).translate(offset)
}

/// Offset from the side midpoint of the `slot`-th (1-based) of `count` ports
/// spread evenly along a side of `length`.
pub(crate) fn port_offset(side: PortSide, length: f32, slot: usize, count: usize) -> Point {
    let along = slot as f32 * length / (count + 1) as f32 - length / 2.0;
    if side_is_vertical(side) {
        Point::new(0.0, along)
    } else {
        Point::new(along, 0.0)
    }
}

fn side_length(bounds: &Rect, side: PortSide) -> f32 {
    if side_is_vertical(side) {
        bounds.height
    } else {
        bounds.width
    }
}

/// Assigns exit and entry ports to every edge whose endpoints are both
/// placed. Ports on one side are spread in edge declaration order; edges
/// touching an unplaced node are not counted toward a side's slots.
pub(super) fn assign_ports(graph: &mut Graph) {
    let (exit_side, entry_side) = port_sides(graph.direction);
    let Graph { nodes, edges, .. } = graph;

    let endpoints: Vec<Option<(usize, usize)>> = edges
        .iter()
        .map(|edge| {
            let from = nodes.get_index_of(&edge.from)?;
            let to = nodes.get_index_of(&edge.to)?;
            let placed = nodes[from].is_placed() && nodes[to].is_placed();
            placed.then_some((from, to))
        })
        .collect();

    let mut out_total = vec![0usize; nodes.len()];
    let mut in_total = vec![0usize; nodes.len()];
    for (from, to) in endpoints.iter().flatten() {
        out_total[*from] += 1;
        in_total[*to] += 1;
    }

    let mut out_seen = vec![0usize; nodes.len()];
    let mut in_seen = vec![0usize; nodes.len()];
    for (edge, endpoints) in edges.iter_mut().zip(&endpoints) {
        let Some((from, to)) = *endpoints else {
            continue;
        };
        let (Some(from_bounds), Some(to_bounds)) = (nodes[from].bounds(), nodes[to].bounds())
        else {
            continue;
        };

        out_seen[from] += 1;
        in_seen[to] += 1;
        edge.exit_port = Some(exit_side);
        edge.entry_port = Some(entry_side);
        edge.exit_offset = port_offset(
            exit_side,
            side_length(&from_bounds, exit_side),
            out_seen[from],
            out_total[from],
        );
        edge.entry_offset = port_offset(
            entry_side,
            side_length(&to_bounds, entry_side),
            in_seen[to],
            in_total[to],
        );
    }
}
