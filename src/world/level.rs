//! Mesh loading
//!
//! Two formats:
//! - Triangle text: one vertex per line (3 floats, whitespace or comma
//!   separated), consecutive vertices grouped in threes. `//` comments and
//!   blank lines are skipped; `rgb r g b` colours the triangles that follow
//!   and `rgb none` switches back to shading.
//! - OBJ subset: `v x y z` and triangular `f i j k` records only.

use std::fs;
use std::path::Path;
use thiserror::Error;
use super::geometry::{Mesh, SceneError, Triangle};
use crate::rasterizer::{Color, Vec3};

/// Error type for mesh loading. Line numbers are 1-based.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected {expected} values, found {found}")]
    TokenCount { line: usize, expected: usize, found: usize },
    #[error("line {line}: invalid number '{token}'")]
    Number { line: usize, token: String },
    #[error("line {line}: invalid colour component '{token}' (0-255)")]
    Color { line: usize, token: String },
    #[error("line {line}: face index '{token}' out of range (have {vertices} vertices)")]
    FaceIndex { line: usize, token: String, vertices: usize },
    #[error("line {line}: {source}")]
    Triangle { line: usize, source: SceneError },
    #[error("file ends with {0} vertices that do not form a triangle")]
    Incomplete(usize),
}

/// Load a mesh, picking the reader from the file extension
pub fn load_mesh<P: AsRef<Path>>(path: P) -> Result<Mesh, LoadError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "mesh".to_string());

    let is_obj = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("obj"))
        .unwrap_or(false);

    let mesh = if is_obj {
        parse_obj(&name, &contents)?
    } else {
        parse_triangles(&name, &contents)?
    };

    log::info!("Loaded mesh '{}' with {} triangles from {}", mesh.name, mesh.len(), path.display());
    Ok(mesh)
}

fn parse_float(token: &str, line: usize) -> Result<f32, LoadError> {
    token.parse().map_err(|_| LoadError::Number { line, token: token.to_string() })
}

fn parse_channel(token: &str, line: usize) -> Result<u8, LoadError> {
    token.parse().map_err(|_| LoadError::Color { line, token: token.to_string() })
}

/// Parse the line-oriented triangle format
pub fn parse_triangles(name: &str, contents: &str) -> Result<Mesh, LoadError> {
    let mut mesh = Mesh::new(name);
    let mut pending: Vec<Vec3> = Vec::with_capacity(3);
    let mut color: Option<Color> = None;

    for (idx, raw) in contents.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with("//") {
            continue;
        }

        let tokens: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.first() == Some(&"rgb") {
            color = match &tokens[1..] {
                ["none"] => None,
                [r, g, b] => Some(Color::new(
                    parse_channel(r, line)?,
                    parse_channel(g, line)?,
                    parse_channel(b, line)?,
                )),
                other => {
                    return Err(LoadError::TokenCount { line, expected: 3, found: other.len() })
                }
            };
            continue;
        }

        if tokens.len() != 3 {
            return Err(LoadError::TokenCount { line, expected: 3, found: tokens.len() });
        }

        pending.push(Vec3::new(
            parse_float(tokens[0], line)?,
            parse_float(tokens[1], line)?,
            parse_float(tokens[2], line)?,
        ));

        if pending.len() == 3 {
            let triangle = Triangle::from_slice(&pending)
                .map_err(|source| LoadError::Triangle { line, source })?;
            mesh.add_triangle(triangle.with_color(color));
            pending.clear();
        }
    }

    if !pending.is_empty() {
        return Err(LoadError::Incomplete(pending.len()));
    }
    Ok(mesh)
}

/// Resolve an OBJ index (1-based, negative counts back from the end)
fn resolve_index(token: &str, line: usize, vertices: usize) -> Result<usize, LoadError> {
    let bad = || LoadError::FaceIndex { line, token: token.to_string(), vertices };
    // "7/1/3" forms: only the position index matters here
    let position = token.split('/').next().unwrap_or(token);
    let index: i64 = position.parse().map_err(|_| bad())?;

    let resolved = if index > 0 {
        index - 1
    } else if index < 0 {
        vertices as i64 + index
    } else {
        return Err(bad());
    };

    if resolved < 0 || resolved as usize >= vertices {
        return Err(bad());
    }
    Ok(resolved as usize)
}

/// Parse the OBJ subset (vertices and triangular faces)
pub fn parse_obj(name: &str, contents: &str) -> Result<Mesh, LoadError> {
    let mut mesh = Mesh::new(name);
    let mut positions: Vec<Vec3> = Vec::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line = idx + 1;
        let parts: Vec<&str> = raw.split_whitespace().collect();

        match parts.first() {
            Some(&"v") => {
                if parts.len() < 4 {
                    return Err(LoadError::TokenCount { line, expected: 3, found: parts.len() - 1 });
                }
                positions.push(Vec3::new(
                    parse_float(parts[1], line)?,
                    parse_float(parts[2], line)?,
                    parse_float(parts[3], line)?,
                ));
            }
            Some(&"f") => {
                if parts.len() != 4 {
                    return Err(LoadError::TokenCount { line, expected: 3, found: parts.len() - 1 });
                }
                let mut corners = [Vec3::ZERO; 3];
                for (corner, token) in corners.iter_mut().zip(&parts[1..]) {
                    *corner = positions[resolve_index(token, line, positions.len())?];
                }
                let triangle = Triangle::new(corners)
                    .map_err(|source| LoadError::Triangle { line, source })?;
                mesh.add_triangle(triangle);
            }
            // Comments, normals, groups, materials...
            _ => {}
        }
    }

    Ok(mesh)
}
