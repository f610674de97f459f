//! Framebuffer and the paint routines for spans and draw commands

use std::path::Path;
use super::math::{barycentric, Vec3};
use super::pipeline::Frame;
use super::types::{Color, DrawCommand, DrawMode, RasterSettings, Span, SpanFill, Viewport};

/// Outline colour of the wireframe overlay
pub const WIREFRAME_COLOR: Color = Color { r: 0, g: 255, b: 0, a: 255 };

/// Framebuffer for software rendering. No depth buffer: visibility is
/// decided before anything is written.
pub struct Framebuffer {
    pub pixels: Vec<u8>, // RGBA, 4 bytes per pixel
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height * 4],
            width,
            height,
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    /// Match a new viewport size, keeping the allocation when it fits
    pub fn resize(&mut self, viewport: Viewport) {
        self.width = viewport.width;
        self.height = viewport.height;
        self.pixels.resize(viewport.width * viewport.height * 4, 0);
    }

    pub fn clear(&mut self, color: Color) {
        let bytes = color.to_bytes();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: Color) {
        if x < self.width && y < self.height {
            let idx = (y * self.width + x) * 4;
            self.pixels[idx..idx + 4].copy_from_slice(&color.to_bytes());
        }
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) * 4;
        let p = &self.pixels[idx..idx + 4];
        Some(Color { r: p[0], g: p[1], b: p[2], a: p[3] })
    }

    /// Draw a line from (x0, y0) to (x1, y1) using Bresenham's algorithm
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            if x >= 0 && y >= 0 {
                self.set_pixel(x as usize, y as usize, color);
            }
            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Paint one span, clipped to the buffer. Pixel x is covered when
    /// `x_start <= x + 0.5 < x_end`.
    pub fn draw_span(&mut self, span: &Span) {
        if span.y >= self.height || span.x_end <= span.x_start {
            return;
        }
        let first = (span.x_start - 0.5).ceil().max(0.0) as usize;
        let last = ((span.x_end - 0.5).ceil().max(0.0) as usize).min(self.width);
        let width = span.x_end - span.x_start;

        for x in first..last {
            let color = match span.fill {
                SpanFill::Background(c) | SpanFill::Solid(c) => c,
                SpanFill::Gradient { start, end } => {
                    let t = ((x as f32 + 0.5 - span.x_start) / width).clamp(0.0, 1.0);
                    Color::grey(start + (end - start) * t)
                }
            };
            self.set_pixel(x, span.y, color);
        }
    }

    pub fn draw_spans(&mut self, spans: &[Span]) {
        for span in spans {
            self.draw_span(span);
        }
    }

    /// Fill a screen triangle with one colour (pixel centres inside)
    pub fn fill_triangle(&mut self, points: [Vec3; 3], color: Color) {
        let [v1, v2, v3] = points;
        if barycentric(v1, v1, v2, v3).is_none() {
            return;
        }
        let min_x = v1.x.min(v2.x).min(v3.x).max(0.0) as usize;
        let max_x = (v1.x.max(v2.x).max(v3.x) + 1.0).clamp(0.0, self.width as f32) as usize;
        let min_y = v1.y.min(v2.y).min(v3.y).max(0.0) as usize;
        let max_y = (v1.y.max(v2.y).max(v3.y) + 1.0).clamp(0.0, self.height as f32) as usize;

        const ERR: f32 = -0.0001;
        for y in min_y..max_y {
            for x in min_x..max_x {
                let p = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, 0.0);
                let inside = barycentric(p, v1, v2, v3).is_some_and(|bc| bc.iter().all(|&w| w >= ERR));
                if inside {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }

    pub fn outline_triangle(&mut self, points: [Vec3; 3], color: Color) {
        let (w, h) = (self.width as f32, self.height as f32);
        for i in 0..3 {
            // Vertices may sit far off screen after the partial clip
            if let Some((a, b)) = clip_line(points[i], points[(i + 1) % 3], w, h) {
                self.draw_line(a.0, a.1, b.0, b.1, color);
            }
        }
    }

    pub fn apply(&mut self, command: &DrawCommand) {
        match *command {
            DrawCommand::FillTriangle { points, color } => self.fill_triangle(points, color),
            DrawCommand::Outline { points, color } => self.outline_triangle(points, color),
        }
    }

    /// Copy into an `image` buffer
    pub fn to_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width as u32, self.height as u32, self.pixels.clone())
    }

    /// Write the current contents as a PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), image::ImageError> {
        let path = path.as_ref();
        let img = self.to_image().ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })?;
        img.save_with_format(path, image::ImageFormat::Png)?;
        log::info!("saved screenshot to {}", path.display());
        Ok(())
    }
}

/// Liang-Barsky clip of segment a-b to [0, w) x [0, h), in pixel coordinates
fn clip_line(a: Vec3, b: Vec3, w: f32, h: f32) -> Option<((i32, i32), (i32, i32))> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
    let max_x = (w - 1.0).max(0.0);
    let max_y = (h - 1.0).max(0.0);

    for (p, q) in [(-dx, a.x), (dx, max_x - a.x), (-dy, a.y), (dy, max_y - a.y)] {
        if p.abs() < f32::EPSILON {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f32| ((a.x + dx * t).round() as i32, (a.y + dy * t).round() as i32);
    Some((at(t0), at(t1)))
}

/// Draw commands for a frame: filled triangles back to front in painter
/// mode, then outlines when the wireframe overlay is on.
pub fn triangle_commands(frame: &Frame, settings: &RasterSettings, out: &mut Vec<DrawCommand>) {
    out.clear();

    if settings.draw_mode == DrawMode::Painter {
        out.extend(frame.triangles.iter().map(|t| DrawCommand::FillTriangle {
            points: t.points,
            color: t.color.unwrap_or_else(|| Color::grey(t.luminance)),
        }));
    }

    if settings.wireframe {
        out.extend(frame.triangles.iter().map(|t| DrawCommand::Outline {
            points: t.points,
            color: WIREFRAME_COLOR,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::ScreenTriangle;

    fn screen_triangle(points: [(f32, f32); 3], luminance: f32) -> ScreenTriangle {
        ScreenTriangle {
            points: points.map(|(x, y)| Vec3::new(x, y, 0.5)),
            color: None,
            luminance,
            depth: 1.0,
        }
    }

    #[test]
    fn test_clear_and_set_pixel() {
        let mut fb = Framebuffer::new(4, 3);
        fb.clear(Color::new(1, 2, 3));
        assert_eq!(fb.get_pixel(3, 2), Some(Color::new(1, 2, 3)));
        fb.set_pixel(1, 1, Color::WHITE);
        fb.set_pixel(10, 10, Color::WHITE);
        assert_eq!(fb.get_pixel(1, 1), Some(Color::WHITE));
        assert_eq!(fb.get_pixel(4, 0), None);
    }

    #[test]
    fn test_draw_span_clips_and_shades() {
        let mut fb = Framebuffer::new(10, 2);
        fb.clear(Color::BLACK);
        fb.draw_span(&Span {
            y: 0,
            x_start: -5.0,
            x_end: 20.0,
            fill: SpanFill::Gradient { start: 0.0, end: 1.0 },
            triangle: Some(0),
        });
        let left = fb.get_pixel(0, 0).unwrap();
        let right = fb.get_pixel(9, 0).unwrap();
        assert!(left.r < right.r);
        // Other rows untouched
        assert_eq!(fb.get_pixel(5, 1), Some(Color::BLACK));

        fb.draw_span(&Span {
            y: 1,
            x_start: 2.0,
            x_end: 4.0,
            fill: SpanFill::Solid(Color::WHITE),
            triangle: Some(0),
        });
        assert_eq!(fb.get_pixel(1, 1), Some(Color::BLACK));
        assert_eq!(fb.get_pixel(2, 1), Some(Color::WHITE));
        assert_eq!(fb.get_pixel(3, 1), Some(Color::WHITE));
        assert_eq!(fb.get_pixel(4, 1), Some(Color::BLACK));
    }

    #[test]
    fn test_fill_triangle_covers_interior() {
        let mut fb = Framebuffer::new(20, 20);
        fb.clear(Color::BLACK);
        let red = Color::new(255, 0, 0);
        fb.fill_triangle([Vec3::new(0.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0), Vec3::new(0.0, 20.0, 0.0)], red);
        assert_eq!(fb.get_pixel(2, 2), Some(red));
        assert_eq!(fb.get_pixel(18, 18), Some(Color::BLACK));
    }

    #[test]
    fn test_draw_line_endpoints() {
        let mut fb = Framebuffer::new(10, 10);
        fb.clear(Color::BLACK);
        fb.draw_line(-3, 2, 12, 2, Color::WHITE);
        assert_eq!(fb.get_pixel(0, 2), Some(Color::WHITE));
        assert_eq!(fb.get_pixel(9, 2), Some(Color::WHITE));
        assert_eq!(fb.get_pixel(5, 3), Some(Color::BLACK));
    }

    #[test]
    fn test_outline_clips_far_vertices() {
        let mut fb = Framebuffer::new(10, 10);
        fb.clear(Color::BLACK);
        fb.outline_triangle(
            [Vec3::new(5.0, 5.0, 0.0), Vec3::new(1.0e5, 5.0, 0.0), Vec3::new(5.0, -1.0e5, 0.0)],
            Color::WHITE,
        );
        assert_eq!(fb.get_pixel(9, 5), Some(Color::WHITE));
        assert_eq!(fb.get_pixel(5, 0), Some(Color::WHITE));
        assert!(clip_line(Vec3::new(-5.0, -5.0, 0.0), Vec3::new(-1.0, -9.0, 0.0), 10.0, 10.0).is_none());
    }

    #[test]
    fn test_triangle_commands_by_mode() {
        let frame = Frame {
            triangles: vec![screen_triangle([(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)], 0.5)],
            shading: vec![[0.5; 3]],
        };
        let mut out = Vec::new();

        triangle_commands(&frame, &RasterSettings::default(), &mut out);
        assert!(out.is_empty());

        let painter = RasterSettings { draw_mode: DrawMode::Painter, wireframe: true, ..Default::default() };
        triangle_commands(&frame, &painter, &mut out);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], DrawCommand::FillTriangle { color, .. } if color == Color::grey(0.5)));
        assert!(matches!(out[1], DrawCommand::Outline { color: WIREFRAME_COLOR, .. }));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let mut fb = Framebuffer::new(8, 4);
        fb.clear(Color::new(10, 20, 30));
        fb.save_png(&path).unwrap();

        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (8, 4));
        assert_eq!(loaded.get_pixel(7, 3).0, [10, 20, 30, 255]);
    }
}
