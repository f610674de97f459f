//! Scene geometry: triangles and meshes
//!
//! Pure data. Meshes are built once at load time and never mutated by the
//! transform pipeline, which works on its own per-frame copies.

use thiserror::Error;
use crate::rasterizer::{Color, Vec3, EPSILON};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("a triangle needs exactly 3 vertices, got {0}")]
    VertexCount(usize),
    #[error("degenerate triangle: fewer than 3 distinct vertices")]
    Degenerate,
}

/// A triangle with an optional flat colour override
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    vertices: [Vec3; 3],
    /// Solid colour; `None` means the triangle is shaded
    pub color: Option<Color>,
}

impl Triangle {
    /// Create a triangle, rejecting repeated vertices
    pub fn new(vertices: [Vec3; 3]) -> Result<Self, SceneError> {
        let [a, b, c] = vertices;
        if a.approx_eq(b, EPSILON) || b.approx_eq(c, EPSILON) || a.approx_eq(c, EPSILON) {
            return Err(SceneError::Degenerate);
        }
        Ok(Self { vertices, color: None })
    }

    pub fn from_slice(vertices: &[Vec3]) -> Result<Self, SceneError> {
        match vertices {
            [a, b, c] => Self::new([*a, *b, *c]),
            _ => Err(SceneError::VertexCount(vertices.len())),
        }
    }

    pub fn with_color(mut self, color: Option<Color>) -> Self {
        self.color = color;
        self
    }

    pub fn vertices(&self) -> &[Vec3; 3] {
        &self.vertices
    }

    pub fn normal(&self) -> Vec3 {
        face_normal(&self.vertices)
    }
}

/// Unit normal from the winding order (v1 - v0) x (v2 - v0)
pub fn face_normal(points: &[Vec3; 3]) -> Vec3 {
    let [a, b, c] = *points;
    (b - a).cross(c - a).normalize_or_self()
}

/// Insertion-ordered triangle list
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            triangles: Vec::new(),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Unit cube centred on the origin, outward-facing in the renderer's
    /// convention (clockwise when seen from outside).
    pub fn cube() -> Self {
        let p = |x: f32, y: f32, z: f32| Vec3::new(x - 0.5, y - 0.5, z - 0.5);
        let quads = [
            // South
            [p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 1.0, 0.0), p(1.0, 0.0, 0.0)],
            // East
            [p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(1.0, 1.0, 1.0), p(1.0, 0.0, 1.0)],
            // North
            [p(1.0, 0.0, 1.0), p(1.0, 1.0, 1.0), p(0.0, 1.0, 1.0), p(0.0, 0.0, 1.0)],
            // West
            [p(0.0, 0.0, 1.0), p(0.0, 1.0, 1.0), p(0.0, 1.0, 0.0), p(0.0, 0.0, 0.0)],
            // Top
            [p(0.0, 1.0, 0.0), p(0.0, 1.0, 1.0), p(1.0, 1.0, 1.0), p(1.0, 1.0, 0.0)],
            // Bottom
            [p(1.0, 0.0, 1.0), p(0.0, 0.0, 1.0), p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0)],
        ];

        let mut mesh = Mesh::new("cube");
        for [a, b, c, d] in quads {
            // Quad corners are distinct, so construction cannot fail
            if let (Ok(t1), Ok(t2)) = (Triangle::new([a, b, c]), Triangle::new([a, c, d])) {
                mesh.add_triangle(t1);
                mesh.add_triangle(t2);
            }
        }
        mesh
    }
}
