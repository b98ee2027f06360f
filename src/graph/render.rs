use super::{Graph, GraphNode};
use crate::canvas::{hex, Canvas, Color, Point};

use std::f64::consts::PI;

const ARROW_SIZE: f64 = 8.0;

/// Colors used to draw the reference graph.
#[derive(Copy, Clone, Debug)]
pub struct Palette {
    pub background: Color,
    pub link: Color,
    pub allocated: Color,
    pub marked: Color,
    pub root: Color,
    pub border: Color,
    pub label: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: hex("#020617"),
            link: hex("#475569"),
            allocated: hex("#06b6d4"),
            marked: hex("#22c55e"),
            root: hex("#a855f7"),
            border: hex("#1e293b"),
            label: hex("#ffffff"),
        }
    }
}

impl Palette {
    // same precedence as the heap grid
    pub fn fill(&self, node: &GraphNode) -> Color {
        if node.root {
            self.root
        } else if node.marked {
            self.marked
        } else {
            self.allocated
        }
    }
}

/// Redraws the whole graph: links first, nodes on top.
pub fn render<C: Canvas + ?Sized>(graph: &Graph, canvas: &mut C, palette: &Palette) {
    canvas.clear(palette.background);

    for link in &graph.links {
        let source = &graph.nodes[link.source];
        let target = &graph.nodes[link.target];
        let from = Point::new(source.x, source.y);
        let to = Point::new(target.x, target.y);

        canvas.stroke_line(from, to, 1.5, palette.link);
        canvas.fill_polygon(&arrow_head(from, to), palette.link);
    }

    for node in &graph.nodes {
        let center = Point::new(node.x, node.y);
        let radius = node.radius();

        canvas.fill_circle(center, radius, palette.fill(node));
        canvas.stroke_circle(center, radius, 2.0, palette.border);
        canvas.fill_text(center, node.id.label(), palette.label);
    }
}

/// Triangle with its tip on `to`, pointing along `from -> to`.
pub(crate) fn arrow_head(from: Point, to: Point) -> [Point; 3] {
    let angle = (to.y - from.y).atan2(to.x - from.x);

    [
        to,
        Point::new(
            to.x - ARROW_SIZE * (angle - PI / 6.0).cos(),
            to.y - ARROW_SIZE * (angle - PI / 6.0).sin(),
        ),
        Point::new(
            to.x - ARROW_SIZE * (angle + PI / 6.0).cos(),
            to.y - ARROW_SIZE * (angle + PI / 6.0).sin(),
        ),
    ]
}
