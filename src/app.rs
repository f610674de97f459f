//! Application state: scene, camera and the per-frame render passes
//!
//! Owned by the render thread. Input arrives as an `InputState` per tick;
//! nothing here touches the window.

use crate::config::EngineConfig;
use crate::input::{Axis, InputState, Toggle};
use crate::rasterizer::{
    triangle_commands, Camera, DrawCommand, DrawMode, Framebuffer, RasterSettings,
    ScanlineRasterizer, TransformPipeline, Viewport, WorldRotation,
};
use crate::world::Mesh;

/// What the last `render` produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub triangles: usize,
    pub spans: usize,
    pub commands: usize,
}

pub struct App {
    pub config: EngineConfig,
    pub camera: Camera,
    pub rotation: WorldRotation,
    pub raster: RasterSettings,
    meshes: Vec<Mesh>,
    active_mesh: usize,
    pipeline: TransformPipeline,
    rasterizer: ScanlineRasterizer,
    commands: Vec<DrawCommand>,
}

impl App {
    /// Create the app; an empty mesh list falls back to the built-in cube
    pub fn new(config: EngineConfig, mut meshes: Vec<Mesh>) -> Self {
        if meshes.is_empty() {
            log::warn!("no meshes loaded, using the built-in cube");
            meshes.push(Mesh::cube());
        }
        let active_mesh = config.initial_mesh % meshes.len();

        let mut app = Self {
            camera: config.camera(),
            rotation: WorldRotation::default(),
            raster: config.raster_settings(),
            pipeline: TransformPipeline::new(config.pipeline_settings()),
            rasterizer: ScanlineRasterizer::new(),
            commands: Vec::new(),
            meshes,
            active_mesh,
            config,
        };
        app.project();
        app
    }

    pub fn viewport(&self) -> Viewport {
        self.config.viewport
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn active_mesh(&self) -> &Mesh {
        &self.meshes[self.active_mesh]
    }

    pub fn active_mesh_index(&self) -> usize {
        self.active_mesh
    }

    /// Add a mesh to the rotation and make it active
    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        log::info!("added mesh '{}' ({} triangles)", mesh.name, mesh.len());
        self.meshes.push(mesh);
        self.active_mesh = self.meshes.len() - 1;
        self.active_mesh
    }

    pub fn next_mesh(&mut self) {
        self.active_mesh = (self.active_mesh + 1) % self.meshes.len();
        log::debug!("active mesh: {}", self.active_mesh().name);
    }

    fn apply_toggle(&mut self, toggle: Toggle) {
        match toggle {
            Toggle::Wireframe => self.raster.wireframe = !self.raster.wireframe,
            Toggle::PreviewRows => self.raster.preview_rows = !self.raster.preview_rows,
            Toggle::NextMesh => self.next_mesh(),
            Toggle::RotateWorld(Axis::X) => self.rotation.x = !self.rotation.x,
            Toggle::RotateWorld(Axis::Y) => self.rotation.y = !self.rotation.y,
            Toggle::RotateWorld(Axis::Z) => self.rotation.z = !self.rotation.z,
            Toggle::SetDrawMode(mode) => self.raster.draw_mode = mode,
        }
    }

    /// Run the active mesh through the transform pipeline
    fn project(&mut self) {
        self.pipeline.run(
            &self.meshes[self.active_mesh],
            &self.camera,
            &self.rotation,
            self.config.viewport,
        );
    }

    /// One simulation tick of `dt` seconds. The scene is projected with the
    /// camera as it was at the start of the tick, then the camera moves.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        for &toggle in input.toggles() {
            self.apply_toggle(toggle);
        }

        if self.rotation.x || self.rotation.y || self.rotation.z {
            self.rotation.angle += self.config.rotation_speed * dt;
        }

        self.project();
        self.camera.apply_input(input);
    }

    /// Paint the frame projected by the last `update` into `fb`
    pub fn render(&mut self, fb: &mut Framebuffer) -> FrameStats {
        let viewport = self.config.viewport;
        if fb.viewport() != viewport {
            fb.resize(viewport);
        }
        fb.clear(self.raster.background);

        let frame = self.pipeline.frame();

        let mut stats = FrameStats { triangles: frame.len(), ..Default::default() };

        if self.raster.draw_mode == DrawMode::Scanline {
            let spans = self.rasterizer.rasterize(frame, viewport, &self.raster, self.camera.position);
            fb.draw_spans(spans);
            stats.spans = spans.len();
        }

        triangle_commands(frame, &self.raster, &mut self.commands);
        for command in &self.commands {
            fb.apply(command);
        }
        stats.commands = self.commands.len();

        stats
    }

    /// One-line summary for the HUD / window title
    pub fn status_line(&self, fps: f32) -> String {
        let mut line = format!(
            "{} | {:.0} fps | pos {} | look {} | fov {:.2} | {}",
            self.raster.draw_mode.label(),
            fps,
            self.camera.position,
            self.camera.look_dir(),
            self.camera.fov,
            self.active_mesh().name,
        );
        if self.raster.wireframe {
            line.push_str(" | wire");
        }
        if self.raster.preview_rows {
            line.push_str(" | rows");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Action;
    use crate::rasterizer::Color;
    use approx::assert_abs_diff_eq;

    fn app() -> App {
        App::new(EngineConfig::default(), Vec::new())
    }

    #[test]
    fn test_empty_mesh_list_uses_cube() {
        let app = app();
        assert_eq!(app.meshes().len(), 1);
        assert_eq!(app.active_mesh().len(), 12);
    }

    #[test]
    fn test_toggles_and_mesh_cycling() {
        let mut app = app();
        app.add_mesh(Mesh::cube());
        assert_eq!(app.active_mesh_index(), 1);

        let input = InputState::new()
            .with_toggle(Toggle::Wireframe)
            .with_toggle(Toggle::NextMesh)
            .with_toggle(Toggle::SetDrawMode(DrawMode::Painter));
        app.update(&input, 0.0);
        assert!(app.raster.wireframe);
        assert_eq!(app.active_mesh_index(), 0);
        assert_eq!(app.raster.draw_mode, DrawMode::Painter);
    }

    #[test]
    fn test_world_rotation_advances_only_when_enabled() {
        let mut app = app();
        app.update(&InputState::new(), 0.5);
        assert_eq!(app.rotation.angle, 0.0);

        app.update(&InputState::new().with_toggle(Toggle::RotateWorld(Axis::Y)), 0.5);
        assert!(app.rotation.y);
        assert_abs_diff_eq!(app.rotation.angle, 0.5);
    }

    #[test]
    fn test_update_moves_camera() {
        let mut app = app();
        app.update(&InputState::new().with_held(Action::MoveForward), 1.0 / 60.0);
        assert_abs_diff_eq!(app.camera.position.z, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_scanline_render_fills_centre() {
        let mut app = app();
        let mut fb = Framebuffer::new(1, 1);
        let stats = app.render(&mut fb);

        assert_eq!(fb.viewport(), app.viewport());
        assert_eq!(stats.triangles, 2);
        assert!(stats.spans > 0);
        assert_eq!(stats.commands, 0);
        let inside = fb.get_pixel(440, 340).unwrap();
        assert!(inside.r > 0);
        assert_eq!(fb.get_pixel(5, 5), Some(Color::BLACK));
    }

    #[test]
    fn test_render_draws_last_projection() {
        let mut app = App::new(EngineConfig::default(), vec![Mesh::cube(), Mesh::new("empty")]);
        let mut fb = Framebuffer::new(800, 600);
        assert_eq!(app.render(&mut fb).triangles, 2);

        // Switching mesh takes effect on the next tick
        app.next_mesh();
        assert_eq!(app.render(&mut fb).triangles, 2);
        app.update(&InputState::new(), 0.0);
        assert_eq!(app.render(&mut fb).triangles, 0);
        assert_eq!(fb.get_pixel(440, 340), Some(Color::BLACK));
    }

    #[test]
    fn test_painter_render_with_wireframe() {
        let mut app = app();
        app.raster.draw_mode = DrawMode::Painter;
        app.raster.wireframe = true;
        let mut fb = Framebuffer::new(800, 600);
        let stats = app.render(&mut fb);

        assert_eq!(stats.spans, 0);
        assert_eq!(stats.commands, 4);
        // Off the quad diagonal, so not under an outline
        assert!(fb.get_pixel(440, 340).unwrap().r > 0);
    }

    #[test]
    fn test_status_line_rounds_fov() {
        let mut app = app();
        app.camera.fov = 70.123;
        let line = app.status_line(59.7);
        assert!(line.starts_with("scanline | 60 fps"));
        assert!(line.contains("fov 70.12"));
    }
}
