//! World module - scene geometry and mesh loading
//!
//! - Triangles and meshes, owned by the scene for the whole run
//! - Readers for the triangle text format and the OBJ subset

mod geometry;
mod level;

pub use geometry::*;
pub use level::*;
