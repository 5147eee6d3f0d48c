use crate::layout::Layout;
use crate::lineage::Marker;
use crate::settings::Orientation;
use svg::Document;
use svg::node::element::{Circle, Line, Path, Polygon, Polyline, Rectangle, Text};

const MARGIN: f64 = 40.0;
const SCALE: f64 = 6.0;
const MARKER_R: f64 = 7.0;
const TRACK_COLORS: [&str; 6] = [
    "#3b6aaa", "#b47846", "#4c9a5f", "#9a4c8c", "#c0a030", "#4ca0b0",
];

fn bounds(layout: &Layout, orientation: Orientation) -> ([f64; 2], [f64; 2]) {
    let mut min = [0.0_f64, 0.0_f64];
    let mut max = [0.0_f64, 0.0_f64];
    for v in layout.tracks.iter().flat_map(|t| &t.vertices) {
        let p = orientation.apply(v.position);
        for axis in 0..2 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (min, max)
}

fn marker_node(marker: Marker, x: f64, y: f64, color: &str) -> Box<dyn svg::Node> {
    match marker {
        Marker::Square => Box::new(
            Rectangle::new()
                .set("x", x - MARKER_R)
                .set("y", y - MARKER_R)
                .set("width", MARKER_R * 2.0)
                .set("height", MARKER_R * 2.0)
                .set("fill", "none")
                .set("stroke", color)
                .set("stroke-width", 2),
        ),
        Marker::Circle => Box::new(
            Circle::new()
                .set("cx", x)
                .set("cy", y)
                .set("r", MARKER_R * 0.7)
                .set("fill", "none")
                .set("stroke", color)
                .set("stroke-width", 2),
        ),
        Marker::Cross => {
            let d = MARKER_R * 0.8;
            let data = format!(
                "M {} {} L {} {} M {} {} L {} {}",
                x - d,
                y - d,
                x + d,
                y + d,
                x - d,
                y + d,
                x + d,
                y - d
            );
            Box::new(
                Path::new()
                    .set("d", data)
                    .set("stroke", color)
                    .set("stroke-width", 2),
            )
        }
        Marker::TriangleUp => {
            let points = format!(
                "{},{} {},{} {},{}",
                x,
                y - MARKER_R,
                x + MARKER_R,
                y + MARKER_R,
                x - MARKER_R,
                y + MARKER_R
            );
            Box::new(
                Polygon::new()
                    .set("points", points)
                    .set("fill", "none")
                    .set("stroke", color)
                    .set("stroke-width", 2),
            )
        }
    }
}

/// Renders lanes, division connectors, markers and the highlighted selection.
pub fn export_tree_svg(layout: &Layout, orientation: Orientation, highlight: &[[f64; 2]]) -> String {
    let (min, max) = bounds(layout, orientation);
    let width = (max[0] - min[0]) * SCALE + MARGIN * 2.0;
    let height = (max[1] - min[1]) * SCALE + MARGIN * 2.0;
    // SVG y grows downward, layout y grows upward.
    let to_svg = |p: [f64; 2]| {
        (
            MARGIN + (p[0] - min[0]) * SCALE,
            MARGIN + (max[1] - p[1]) * SCALE,
        )
    };

    let mut doc = Document::new()
        .set("viewBox", (0, 0, width, height))
        .set("width", width)
        .set("height", height)
        .set("style", "background:#ffffff")
        .add(
            Text::new(format!(
                "Lineage tree ({} lane(s), mode {:?}, feature {:?})",
                layout.lane_count(),
                layout.mode,
                layout.feature
            ))
            .set("x", 8)
            .set("y", 16)
            .set("font-family", "Helvetica, Arial, sans-serif")
            .set("font-size", 12)
            .set("fill", "#202020"),
        );

    for connector in &layout.connectors {
        let points = connector
            .points
            .iter()
            .map(|p| {
                let (x, y) = to_svg(orientation.apply(*p));
                format!("{x},{y}")
            })
            .collect::<Vec<_>>()
            .join(" ");
        doc = doc.add(
            Polyline::new()
                .set("points", points)
                .set("fill", "none")
                .set("stroke", "#8a8a8a")
                .set("stroke-width", 1.2),
        );
    }

    for track in &layout.tracks {
        let color = TRACK_COLORS[track.track_ref.tree % TRACK_COLORS.len()];
        let (x1, y1) = to_svg(orientation.apply(track.vertices[0].position));
        let (x2, y2) = to_svg(orientation.apply(track.vertices[track.vertices.len() - 1].position));
        doc = doc.add(
            Line::new()
                .set("x1", x1)
                .set("y1", y1)
                .set("x2", x2)
                .set("y2", y2)
                .set("stroke", color)
                .set("stroke-width", 3),
        );
        for v in &track.vertices {
            let (x, y) = to_svg(orientation.apply(v.position));
            doc = doc.add(marker_node(v.marker, x, y, color));
        }
    }

    for p in highlight {
        let (x, y) = to_svg(*p);
        doc = doc.add(
            Circle::new()
                .set("cx", x)
                .set("cy", y)
                .set("r", MARKER_R * 1.4)
                .set("fill", "none")
                .set("stroke", "lightblue")
                .set("stroke-width", 4),
        );
    }

    doc.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::decompose;
    use crate::settings::ViewSettings;
    use crate::track_graph::tests::graph_from;
    use std::collections::HashSet;

    #[test]
    fn test_export_tree_svg() {
        let graph = graph_from(&[(1, 0, None), (2, 1, Some(1)), (3, 1, Some(1))]);
        let forest = decompose(&graph, None).unwrap();
        let layout = Layout::assign(&forest, &ViewSettings::default(), &HashSet::new()).unwrap();
        let svg = export_tree_svg(&layout, Orientation::Vertical, &[[10.0, 0.0]]);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Lineage tree (3 lane(s)"));
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("<polygon"));
        assert!(svg.contains("lightblue"));
    }

    #[test]
    fn test_export_empty_layout() {
        let layout = Layout::assign(
            &Default::default(),
            &ViewSettings::default(),
            &HashSet::new(),
        )
        .unwrap();
        let svg = export_tree_svg(&layout, Orientation::Horizontal, &[]);
        assert!(svg.contains("0 lane(s)"));
    }
}
