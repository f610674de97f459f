//! Software 3D renderer
//!
//! - Row-vector math (`v' = v * M`), homogeneous `w` carried on every point
//! - Transform pipeline with back-face culling, per-vertex lighting and
//!   painter ordering
//! - Scanline rasterizer resolving overlaps analytically, no Z-buffer
//! - Gouraud shaded spans, flat colour override per triangle

mod math;
mod types;
mod camera;
mod pipeline;
mod scanline;
mod render;

pub use math::*;
pub use types::*;
pub use camera::*;
pub use pipeline::*;
pub use scanline::*;
pub use render::*;

/// Default output resolution
pub const WIDTH: usize = 800;
pub const HEIGHT: usize = 600;
