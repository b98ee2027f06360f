//! A small immediate-mode drawing surface.
//!
//! The graph renderer only needs lines, filled polygons, circles and short
//! labels. [`RasterCanvas`] maps those onto `imageproc`'s drawing functions
//! over an [`image::RgbaImage`]. Labels need a TrueType font; a canvas without
//! one draws everything else and skips the text.

use super::error::Result;

use ab_glyph::{FontArc, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut,
    draw_text_mut, text_size,
};
use imageproc::point::Point as Vertex;
use std::fs;
use std::path::Path;

const LABEL_SCALE: f32 = 11.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn rounded(self) -> Vertex<i32> {
        Vertex::new(self.x.round() as i32, self.y.round() as i32)
    }

    fn as_f32(self) -> (f32, f32) {
        (self.x as f32, self.y as f32)
    }
}

pub type Color = Rgba<u8>;

/// Parses a `#rrggbb` color. Anything else comes back as opaque black.
pub fn hex(color: &str) -> Color {
    let digits = color.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };

    Rgba([channel(0..2), channel(2..4), channel(4..6), 255])
}

/// Reads a TrueType or OpenType font for node labels.
pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = fs::read(path)?;

    Ok(FontArc::try_from_vec(bytes)?)
}

pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn clear(&mut self, color: Color);
    fn stroke_line(&mut self, from: Point, to: Point, width: f64, color: Color);
    fn fill_polygon(&mut self, points: &[Point], color: Color);
    fn fill_circle(&mut self, center: Point, radius: f64, color: Color);
    fn stroke_circle(&mut self, center: Point, radius: f64, width: f64, color: Color);
    /// Draws `text` centred on `center`.
    fn fill_text(&mut self, center: Point, text: &str, color: Color);
}

pub struct RasterCanvas {
    image: RgbaImage,
    font: Option<FontArc>,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            font: None,
        }
    }

    pub fn set_font(&mut self, font: FontArc) {
        self.font = Some(font);
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        *self.image.get_pixel(x, y)
    }
}

// Integer vertices with repeats removed. `draw_polygon_mut` rejects an
// outline whose last vertex equals its first.
fn outline(points: &[Point]) -> Vec<Vertex<i32>> {
    let mut vertices: Vec<Vertex<i32>> = Vec::with_capacity(points.len());

    for point in points {
        let vertex = point.rounded();
        if vertices.last() != Some(&vertex) {
            vertices.push(vertex);
        }
    }
    while vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    vertices
}

impl Canvas for RasterCanvas {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn clear(&mut self, color: Color) {
        self.image.pixels_mut().for_each(|pixel| *pixel = color);
    }

    fn stroke_line(&mut self, from: Point, to: Point, width: f64, color: Color) {
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let len = (dx * dx + dy * dy).sqrt();

        if width <= 1.5 || len == 0.0 {
            draw_line_segment_mut(&mut self.image, from.as_f32(), to.as_f32(), color);
            return;
        }

        // a quad around the segment
        let (nx, ny) = (-dy / len * width / 2.0, dx / len * width / 2.0);
        self.fill_polygon(
            &[
                Point::new(from.x + nx, from.y + ny),
                Point::new(to.x + nx, to.y + ny),
                Point::new(to.x - nx, to.y - ny),
                Point::new(from.x - nx, from.y - ny),
            ],
            color,
        );
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        let vertices = outline(points);

        match vertices.as_slice() {
            [] => {}
            [only] => draw_line_segment_mut(
                &mut self.image,
                (only.x as f32, only.y as f32),
                (only.x as f32, only.y as f32),
                color,
            ),
            [first, second] => draw_line_segment_mut(
                &mut self.image,
                (first.x as f32, first.y as f32),
                (second.x as f32, second.y as f32),
                color,
            ),
            _ => draw_polygon_mut(&mut self.image, &vertices, color),
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color) {
        let center = center.rounded();

        draw_filled_circle_mut(
            &mut self.image,
            (center.x, center.y),
            radius.round() as i32,
            color,
        );
    }

    fn stroke_circle(&mut self, center: Point, radius: f64, width: f64, color: Color) {
        let center = center.rounded();
        let half = width / 2.0;
        let inner = (radius - half).round().max(0.0) as i32;
        let outer = (radius + half).round() as i32;

        for ring in inner..=outer {
            draw_hollow_circle_mut(&mut self.image, (center.x, center.y), ring, color);
        }
    }

    fn fill_text(&mut self, center: Point, text: &str, color: Color) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        if text.is_empty() {
            return;
        }

        let scale = PxScale::from(LABEL_SCALE);
        let (w, h) = text_size(scale, font, text);
        let x = (center.x - w as f64 / 2.0).round() as i32;
        let y = (center.y - h as f64 / 2.0).round() as i32;

        draw_text_mut(&mut self.image, color, x, y, scale, font, text);
    }
}
