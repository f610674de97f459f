//! Vector and matrix math for 3D rendering
//!
//! Row-vector convention throughout: a point is transformed as `v' = v·M`,
//! so translations live in the bottom row and `a.mul(&b)` applies `a` first.

use std::ops::{Add, Mul, Neg, Sub};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest magnitude treated as non-zero
pub const EPSILON: f32 = 1e-6;

/// Errors from the checked vector operations
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MathError {
    #[error("division by zero (denominator {0})")]
    DivisionByZero(f32),
    #[error("cannot normalize a vector of length {0}")]
    DegenerateVector(f32),
}

fn default_w() -> f32 {
    1.0
}

/// Homogeneous 3D vector. `w` is 1 for points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default = "default_w")]
    pub w: f32,
}

impl Default for Vec3 {
    fn default() -> Self {
        Vec3::ZERO
    }
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };
    pub const UP: Vec3 = Vec3 { x: 0.0, y: 1.0, z: 0.0, w: 1.0 };
    pub const FORWARD: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 1.0, w: 1.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, w: 1.0 }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn len(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn scale(self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }

    /// Divide x, y and z by `d`. The result is a point again (`w = 1`).
    pub fn checked_div(self, d: f32) -> Result<Vec3, MathError> {
        if d.abs() < EPSILON {
            return Err(MathError::DivisionByZero(d));
        }
        Ok(Vec3::new(self.x / d, self.y / d, self.z / d))
    }

    pub fn try_normalize(self) -> Result<Vec3, MathError> {
        let l = self.len();
        if l < EPSILON {
            return Err(MathError::DegenerateVector(l));
        }
        self.checked_div(l)
    }

    /// Normalize, leaving degenerate vectors untouched.
    /// Used inside the frame loop where a bad vector must not stop the frame.
    pub fn normalize_or_self(self) -> Vec3 {
        self.try_normalize().unwrap_or(self)
    }

    /// Row vector times matrix, all four components
    pub fn transform(self, m: &Mat4) -> Vec3 {
        let d = &m.data;
        Vec3 {
            x: self.x * d[0][0] + self.y * d[1][0] + self.z * d[2][0] + self.w * d[3][0],
            y: self.x * d[0][1] + self.y * d[1][1] + self.z * d[2][1] + self.w * d[3][1],
            z: self.x * d[0][2] + self.y * d[1][2] + self.z * d[2][2] + self.w * d[3][2],
            w: self.x * d[0][3] + self.y * d[1][3] + self.z * d[2][3] + self.w * d[3][3],
        }
    }

    /// Component-wise equality within `eps`, `w` included
    pub fn approx_eq(self, other: Vec3, eps: f32) -> bool {
        (self.x - other.x).abs() < eps
            && (self.y - other.y).abs() < eps
            && (self.z - other.z).abs() < eps
            && (self.w - other.w).abs() < eps
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 {
        self.scale(s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.2}, {:.2}, {:.2}]", self.x, self.y, self.z)
    }
}

/// 4x4 row-major matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub data: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Mat4::identity()
    }
}

impl Mat4 {
    pub const ZERO: Mat4 = Mat4 { data: [[0.0; 4]; 4] };

    pub fn identity() -> Self {
        let mut m = Mat4::ZERO;
        for i in 0..4 {
            m.data[i][i] = 1.0;
        }
        m
    }

    pub fn rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Mat4::ZERO;
        m.data[0][0] = 1.0;
        m.data[1][1] = c;
        m.data[1][2] = s;
        m.data[2][1] = -s;
        m.data[2][2] = c;
        m.data[3][3] = 1.0;
        m
    }

    pub fn rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Mat4::ZERO;
        m.data[0][0] = c;
        m.data[0][2] = s;
        m.data[1][1] = 1.0;
        m.data[2][0] = -s;
        m.data[2][2] = c;
        m.data[3][3] = 1.0;
        m
    }

    pub fn rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Mat4::ZERO;
        m.data[0][0] = c;
        m.data[0][1] = s;
        m.data[1][0] = -s;
        m.data[1][1] = c;
        m.data[2][2] = 1.0;
        m.data[3][3] = 1.0;
        m
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Mat4::identity();
        m.data[3][0] = x;
        m.data[3][1] = y;
        m.data[3][2] = z;
        m
    }

    /// Perspective projection. `aspect` is height / width and scales X.
    /// The fourth output column copies view-space z into `w` for the divide.
    pub fn perspective(fov_deg: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        let fov_rad = fov_deg.to_radians();
        let cot = 1.0 / (0.5 * fov_rad).tan();

        let mut m = Mat4::ZERO;
        m.data[0][0] = aspect * cot;
        m.data[1][1] = cot;
        m.data[2][2] = z_far / (z_far - z_near);
        m.data[3][2] = (-z_far * z_near) / (z_far - z_near);
        m.data[2][3] = 1.0;
        m
    }

    /// Camera-to-world matrix: orthonormal basis from Gram-Schmidt, then position.
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let forward = (target - position).normalize_or_self();
        let up = (up - forward * up.dot(forward)).normalize_or_self();
        let right = up.cross(forward);

        Mat4 {
            data: [
                [right.x, right.y, right.z, 0.0],
                [up.x, up.y, up.z, 0.0],
                [forward.x, forward.y, forward.z, 0.0],
                [position.x, position.y, position.z, 1.0],
            ],
        }
    }

    /// Inverse of a rigid (rotation + translation) matrix.
    ///
    /// Only correct when the upper 3x3 block is orthonormal: any scale or
    /// shear gives a wrong result without an error. Callers pass `look_at`
    /// output and nothing else.
    pub fn quick_inverse(&self) -> Self {
        let m = &self.data;
        let mut inv = Mat4::ZERO;

        for r in 0..3 {
            for c in 0..3 {
                inv.data[r][c] = m[c][r];
            }
        }

        for c in 0..3 {
            inv.data[3][c] = -(m[3][0] * inv.data[0][c]
                + m[3][1] * inv.data[1][c]
                + m[3][2] * inv.data[2][c]);
        }
        inv.data[3][3] = 1.0;
        inv
    }

    pub fn mul(&self, other: &Mat4) -> Mat4 {
        let mut out = Mat4::ZERO;
        for r in 0..4 {
            for c in 0..4 {
                out.data[r][c] = (0..4).map(|k| self.data[r][k] * other.data[k][c]).sum();
            }
        }
        out
    }

    pub fn approx_eq(&self, other: &Mat4, eps: f32) -> bool {
        self.data
            .iter()
            .flatten()
            .zip(other.data.iter().flatten())
            .all(|(a, b)| (a - b).abs() < eps)
    }
}

/// Barycentric weights of `p` in the screen triangle (v1, v2, v3), ignoring z.
/// `None` for a triangle with no area.
pub fn barycentric(p: Vec3, v1: Vec3, v2: Vec3, v3: Vec3) -> Option<[f32; 3]> {
    let d = (v2.y - v3.y) * (v1.x - v3.x) + (v3.x - v2.x) * (v1.y - v3.y);
    if d.abs() < EPSILON {
        return None;
    }

    let u = ((v2.y - v3.y) * (p.x - v3.x) + (v3.x - v2.x) * (p.y - v3.y)) / d;
    let v = ((v3.y - v1.y) * (p.x - v3.x) + (v1.x - v3.x) * (p.y - v3.y)) / d;
    Some([u, v, 1.0 - u - v])
}

/// Map `value` from range [in_a, in_b] to [out_a, out_b]
pub fn scale_to_range(in_a: f32, in_b: f32, value: f32, out_a: f32, out_b: f32) -> f32 {
    (value - in_a) / (in_b - in_a) * (out_b - out_a) + out_a
}
