//! Engine configuration, stored as RON

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::rasterizer::{
    Camera, Color, Light, PipelineSettings, RasterSettings, Vec3, Viewport, HEIGHT, WIDTH, Z_FAR, Z_NEAR,
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Everything the engine reads at startup. Missing fields take their
/// default, so a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub viewport: Viewport,
    /// Window pixels per framebuffer pixel
    pub window_scale: f32,
    pub fov: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub camera_position: Vec3,
    pub move_step: f32,
    pub turn_step: f32,
    pub world_offset: f32,
    /// World rotation speed in radians per second
    pub rotation_speed: f32,
    pub light: Light,
    pub preview_stride: usize,
    /// Simulation ticks per second
    pub tick_rate: f32,
    pub meshes: Vec<PathBuf>,
    pub initial_mesh: usize,
    pub background: Color,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(WIDTH, HEIGHT),
            window_scale: 1.0,
            fov: 70.0,
            z_near: Z_NEAR,
            z_far: Z_FAR,
            camera_position: Vec3::ZERO,
            move_step: 0.1,
            turn_step: 0.01,
            world_offset: 3.0,
            rotation_speed: 1.0,
            light: Light::default(),
            preview_stride: 5,
            tick_rate: 60.0,
            meshes: Vec::new(),
            initial_mesh: 0,
            background: Color::BLACK,
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    pub fn from_ron(s: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(s)?)
    }

    /// Load `path`, or fall back to the defaults with a warning
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                log::info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("using default config ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .indentor("  ".to_string());
        let contents = ron::ser::to_string_pretty(self, pretty)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Fixed simulation step
    pub fn tick(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_rate.max(1.0))
    }

    pub fn camera(&self) -> Camera {
        let mut camera = Camera::new(self.camera_position, self.fov);
        camera.move_step = self.move_step;
        camera.turn_step = self.turn_step;
        camera
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            world_offset: self.world_offset,
            light: self.light,
            z_near: self.z_near,
            z_far: self.z_far,
        }
    }

    pub fn raster_settings(&self) -> RasterSettings {
        RasterSettings {
            preview_stride: self.preview_stride,
            background: self.background,
            ..Default::default()
        }
    }
}
