//! Scanline rasterizer with analytic hidden-surface resolution
//!
//! No depth buffer. Every row walks the sorted list of edge crossings and
//! keeps the set of triangles the cursor is currently inside. A convex
//! triangle crosses a row 0 or 2 times, so each crossing toggles membership.
//! Where several triangles overlap, each one's plane is solved at the middle
//! of the span and the nearest wins.

use std::collections::HashMap;
use super::math::{scale_to_range, Vec3, EPSILON};
use super::pipeline::{Frame, ScreenTriangle, VertexShading};
use super::types::{RasterSettings, Span, SpanFill, Viewport};

/// Quantisation grid for vertex merging. Vertices whose coordinates round to
/// the same grid cell share shading; this is not a tolerance test, so points
/// straddling a cell boundary stay separate.
const MERGE_GRID: f32 = 1e-3;

/// Triangle edge, endpoints in screen space
#[derive(Debug, Clone, Copy)]
struct Edge {
    triangle: usize,
    from: Vec3,
    to: Vec3,
}

impl Edge {
    fn x_at(&self, y: f32) -> Option<f32> {
        crossing(self.from, self.to, y)
    }
}

/// X where the segment a-b meets row `y`.
///
/// Half-open in Y: the upper endpoint's row counts, the lower one's does not,
/// and horizontal segments never cross. A triangle therefore yields exactly 0
/// or 2 crossings on any row, even when a vertex sits on it.
fn crossing(a: Vec3, b: Vec3, y: f32) -> Option<f32> {
    let (top, bottom) = if a.y <= b.y { (a, b) } else { (b, a) };
    if !(y >= top.y && y < bottom.y) {
        return None;
    }
    Some(scale_to_range(top.y, bottom.y, y, top.x, bottom.x))
}

#[derive(Debug, Clone, Copy)]
struct Crossing {
    x: f32,
    edge: usize,
}

/// Plane depth at screen (x, y) minus the distance from `eye` to that point.
/// Smaller means nearer.
pub fn depth_proxy(triangle: &ScreenTriangle, x: f32, y: f32, eye: Vec3) -> f32 {
    let [p1, p2, p3] = triangle.points;
    let det = (p2.x - p1.x) * (p3.y - p1.y) - (p3.x - p1.x) * (p2.y - p1.y);

    // Edge-on in screen space: no usable plane, fall back to the first vertex
    let z = if det.abs() < EPSILON {
        p1.z
    } else {
        let dz_dy = ((p2.x - p1.x) * (p3.z - p1.z) - (p3.x - p1.x) * (p2.z - p1.z)) / det;
        let dz_dx = ((p2.y - p1.y) * (p3.z - p1.z) - (p3.y - p1.y) * (p2.z - p1.z)) / det;
        p1.z + dz_dy * (y - p1.y) - dz_dx * (x - p1.x)
    };

    z - (Vec3::new(x, y, z) - eye).len()
}

/// Average the intensity of vertices shared between triangles, grouping them
/// by `MERGE_GRID` cell.
/// Positions are untouched; the result is parallel to `frame.shading`.
pub fn merge_shading(frame: &Frame, merged: &mut Vec<VertexShading>) {
    let key = |v: Vec3| {
        (
            (v.x / MERGE_GRID).round() as i64,
            (v.y / MERGE_GRID).round() as i64,
            (v.z / MERGE_GRID).round() as i64,
        )
    };

    // Running mean per position
    let mut means: HashMap<(i64, i64, i64), (f32, u32)> = HashMap::new();
    for (t, shading) in frame.triangles.iter().zip(&frame.shading) {
        for (v, &intensity) in t.points.iter().zip(shading) {
            let entry = means.entry(key(*v)).or_insert((0.0, 0));
            entry.1 += 1;
            entry.0 += (intensity - entry.0) / entry.1 as f32;
        }
    }

    merged.clear();
    merged.extend(frame.triangles.iter().map(|t| {
        t.points.map(|v| means.get(&key(v)).map(|m| m.0).unwrap_or(0.0))
    }));
}

/// Scanline engine. Buffers are kept between frames to avoid reallocating.
#[derive(Debug, Default)]
pub struct ScanlineRasterizer {
    edges: Vec<Edge>,
    active: Vec<Crossing>,
    inside: Vec<usize>,
    shading: Vec<VertexShading>,
    spans: Vec<Span>,
}

impl ScanlineRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans produced by the last call to `rasterize`
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Merged per-vertex intensities used for the last frame
    pub fn shading(&self) -> &[VertexShading] {
        &self.shading
    }

    /// Turn the frame's triangles into shaded spans.
    /// `eye` is the camera position used by the overlap depth probe.
    pub fn rasterize(
        &mut self,
        frame: &Frame,
        viewport: Viewport,
        settings: &RasterSettings,
        eye: Vec3,
    ) -> &[Span] {
        self.spans.clear();
        merge_shading(frame, &mut self.shading);
        self.build_edges(frame);

        for y in (0..viewport.height).step_by(settings.row_stride()) {
            self.scan_row(frame, y, viewport, settings, eye);
        }

        log::trace!("scanline: {} edges, {} spans", self.edges.len(), self.spans.len());
        &self.spans
    }

    fn build_edges(&mut self, frame: &Frame) {
        self.edges.clear();
        for (i, t) in frame.triangles.iter().enumerate() {
            let [a, b, c] = t.points;
            self.edges.push(Edge { triangle: i, from: a, to: b });
            self.edges.push(Edge { triangle: i, from: b, to: c });
            self.edges.push(Edge { triangle: i, from: c, to: a });
        }
    }

    fn scan_row(
        &mut self,
        frame: &Frame,
        y: usize,
        viewport: Viewport,
        settings: &RasterSettings,
        eye: Vec3,
    ) {
        let row = y as f32;

        self.active.clear();
        for (i, edge) in self.edges.iter().enumerate() {
            if let Some(x) = edge.x_at(row) {
                self.active.push(Crossing { x, edge: i });
            }
        }
        // sort_by is stable: equal x keeps edge order
        self.active.sort_by(|a, b| a.x.total_cmp(&b.x));

        self.inside.clear();
        let mut cursor = 0.0_f32;

        for ci in 0..self.active.len() {
            let Crossing { x, edge } = self.active[ci];

            let owner = match self.inside.len() {
                0 => None,
                1 => Some(self.inside[0]),
                _ => Some(self.nearest(frame, (cursor + x) * 0.5, row, eye)),
            };

            if x > cursor {
                match owner {
                    Some(t) => {
                        let fill = self.shade(frame, t, row, cursor, x);
                        self.spans.push(Span { y, x_start: cursor, x_end: x, fill, triangle: Some(t) });
                    }
                    None if settings.background_spans => {
                        self.spans.push(Span {
                            y,
                            x_start: cursor,
                            x_end: x,
                            fill: SpanFill::Background(settings.background),
                            triangle: None,
                        });
                    }
                    None => {}
                }
            }
            cursor = x;

            let triangle = self.edges[edge].triangle;
            if let Some(pos) = self.inside.iter().position(|&t| t == triangle) {
                self.inside.swap_remove(pos);
            } else {
                self.inside.push(triangle);
            }
        }

        let right = viewport.width as f32;
        if settings.background_spans && cursor < right {
            self.spans.push(Span {
                y,
                x_start: cursor,
                x_end: right,
                fill: SpanFill::Background(settings.background),
                triangle: None,
            });
        }
    }

    /// Active triangle with the smallest depth proxy at (x, y)
    fn nearest(&self, frame: &Frame, x: f32, y: f32, eye: Vec3) -> usize {
        let mut best = self.inside[0];
        let mut best_depth = f32::MAX;
        for &t in &self.inside {
            let d = depth_proxy(&frame.triangles[t], x, y, eye);
            if d < best_depth {
                best = t;
                best_depth = d;
            }
        }
        best
    }

    /// Fill for the part [x0, x1] of triangle `t` on row `y`
    fn shade(&self, frame: &Frame, t: usize, y: f32, x0: f32, x1: f32) -> SpanFill {
        let triangle = &frame.triangles[t];
        if let Some(color) = triangle.color {
            return SpanFill::Solid(color);
        }

        match gouraud_span(triangle.points, self.shading[t], y, x0, x1) {
            Some((start, end)) => SpanFill::Gradient { start, end },
            // No apex on this row (degenerate geometry): flat fallback
            None => SpanFill::Gradient { start: triangle.luminance, end: triangle.luminance },
        }
    }
}

/// Intensities at x0 and x1 on row `y` of a Gouraud-shaded triangle.
///
/// The apex is the vertex whose two edges both cross the row. Intensity is
/// interpolated along Y from the apex to each far vertex, then along X
/// between the two boundary crossings.
pub fn gouraud_span(
    points: [Vec3; 3],
    intensity: VertexShading,
    y: f32,
    x0: f32,
    x1: f32,
) -> Option<(f32, f32)> {
    let apex = (0..3).find(|&i| {
        crossing(points[i], points[(i + 1) % 3], y).is_some()
            && crossing(points[i], points[(i + 2) % 3], y).is_some()
    })?;
    let (j, k) = ((apex + 1) % 3, (apex + 2) % 3);
    let a = points[apex];

    let boundary = |v: usize| {
        let x = crossing(a, points[v], y)?;
        let lum = scale_to_range(a.y, points[v].y, y, intensity[apex], intensity[v]);
        Some((x, lum))
    };
    let (mut left, mut right) = (boundary(j)?, boundary(k)?);
    if left.0 > right.0 {
        std::mem::swap(&mut left, &mut right);
    }

    let at = |x: f32| {
        if (right.0 - left.0).abs() < EPSILON {
            left.1
        } else {
            scale_to_range(left.0, right.0, x, left.1, right.1)
        }
    };

    Some((at(x0).clamp(0.0, 1.0), at(x1).clamp(0.0, 1.0)))
}
