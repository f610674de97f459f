//! Scanline Engine: software 3D renderer
//!
//! - `rasterizer`: math, camera, transform pipeline, scanline engine, framebuffer
//! - `world`: triangles, meshes and the mesh file readers
//! - `input`, `config`, `app`, `runtime`: the engine around the renderer

pub mod rasterizer;
pub mod world;
pub mod input;
pub mod config;
pub mod app;
pub mod runtime;
