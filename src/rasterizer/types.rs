//! Core types for the rasterizer

use serde::{Deserialize, Serialize};
use super::math::Vec3;

/// RGBA color (0-255 per channel)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Grey level for a luminance in 0.0-1.0
    pub fn grey(intensity: f32) -> Self {
        Color::WHITE.shade(intensity)
    }

    /// Apply shading (multiply by intensity 0.0-1.0)
    pub fn shade(self, intensity: f32) -> Self {
        let i = if intensity.is_nan() { 0.0 } else { intensity.clamp(0.0, 1.0) };
        Self {
            r: (self.r as f32 * i) as u8,
            g: (self.g as f32 * i) as u8,
            b: (self.b as f32 * i) as u8,
            a: self.a,
        }
    }

    /// Convert to [u8; 4] for framebuffer
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Output resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Height over width, the factor the projection applies to X
    pub fn aspect(&self) -> f32 {
        self.height as f32 / self.width.max(1) as f32
    }
}

/// How the projected triangles reach the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawMode {
    /// Analytic scanline engine with overlap resolution and Gouraud spans
    #[default]
    Scanline,
    /// Filled triangles back-to-front, one flat colour each
    Painter,
}

impl DrawMode {
    pub fn label(&self) -> &'static str {
        match self {
            DrawMode::Scanline => "scanline",
            DrawMode::Painter => "painter",
        }
    }
}

/// Rasterizer settings (toggled by the input collaborator)
#[derive(Debug, Clone)]
pub struct RasterSettings {
    pub draw_mode: DrawMode,
    /// Draw triangle outlines on top of the fill
    pub wireframe: bool,
    /// Skip rows for a fast preview of the scanline pass
    pub preview_rows: bool,
    /// Row stride used while `preview_rows` is on
    pub preview_stride: usize,
    /// Emit explicit background spans between triangles
    pub background_spans: bool,
    pub background: Color,
}

impl RasterSettings {
    pub fn row_stride(&self) -> usize {
        if self.preview_rows {
            self.preview_stride.max(1)
        } else {
            1
        }
    }
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            draw_mode: DrawMode::Scanline,
            wireframe: false,
            preview_rows: false,
            preview_stride: 5,
            background_spans: false,
            background: Color::BLACK,
        }
    }
}

/// What a span is filled with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpanFill {
    Background(Color),
    Solid(Color),
    /// Grey ramp from `start` to `end` intensity
    Gradient { start: f32, end: f32 },
}

/// One horizontal run of pixels on a scanline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub y: usize,
    pub x_start: f32,
    pub x_end: f32,
    pub fill: SpanFill,
    /// Index into the frame's triangle list, `None` for background
    pub triangle: Option<usize>,
}

/// Screen-space draw commands for the painter mode and the wireframe overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    FillTriangle { points: [Vec3; 3], color: Color },
    Outline { points: [Vec3; 3], color: Color },
}
