//! Transform pipeline: object -> world -> view -> clip -> screen
//!
//! Each frame runs in passes over a set of stage buffers that live in a
//! `FrameArena` and are reused from frame to frame. The source mesh is only
//! ever read.

use serde::{Deserialize, Serialize};
use super::camera::Camera;
use super::math::{Mat4, Vec3, EPSILON};
use super::types::{Color, Viewport};
use crate::world::{face_normal, Mesh};

pub const Z_NEAR: f32 = 0.1;
pub const Z_FAR: f32 = 1000.0;

/// Light used for per-vertex intensities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Light {
    /// Point light at a world position
    Point(Vec3),
    /// Direction towards the light, same for every vertex
    Directional(Vec3),
}

impl Light {
    /// Lambert term for a surface point with the given unit normal
    pub fn intensity(&self, normal: Vec3, at: Vec3) -> f32 {
        let to_light = match *self {
            Light::Point(pos) => pos - at,
            Light::Directional(dir) => dir,
        };
        normal.dot(to_light.normalize_or_self()).max(0.0)
    }
}

impl Default for Light {
    fn default() -> Self {
        Light::Point(Vec3::new(0.0, 3.0, 0.0))
    }
}

/// Model rotation about the world axes, each toggled independently
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldRotation {
    pub x: bool,
    pub y: bool,
    pub z: bool,
    /// Shared angle in radians
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Push the model away from the origin along +Z
    pub world_offset: f32,
    pub light: Light,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            world_offset: 3.0,
            light: Light::default(),
            z_near: Z_NEAR,
            z_far: Z_FAR,
        }
    }
}

/// Per-vertex intensities of one triangle, parallel to the triangle list
pub type VertexShading = [f32; 3];

/// A triangle after projection: x/y in pixels, z is normalized depth
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenTriangle {
    pub points: [Vec3; 3],
    pub color: Option<Color>,
    /// Flat-shading fallback
    pub luminance: f32,
    /// Mean view-space z, used for back-to-front ordering
    pub depth: f32,
}

/// Pipeline output for one frame, ordered back to front
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub triangles: Vec<ScreenTriangle>,
    /// `shading[i]` belongs to `triangles[i]`
    pub shading: Vec<VertexShading>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn clear(&mut self) {
        self.triangles.clear();
        self.shading.clear();
    }
}

/// Pipeline stages that keep a scratch buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    World = 0,
    View = 1,
    Projected = 2,
}

/// Triangle in some stage. `slot` is its index in the world stage.
#[derive(Debug, Clone, Copy)]
struct Staged {
    points: [Vec3; 3],
    slot: usize,
}

/// Lighting computed in world space, indexed like the world stage
#[derive(Debug, Clone, Copy)]
struct Lit {
    source: usize,
    shading: VertexShading,
    luminance: f32,
}

/// Scratch buffers reused across frames
#[derive(Debug, Default)]
pub struct FrameArena {
    stages: [Vec<Staged>; 3],
    lit: Vec<Lit>,
    order: Vec<usize>,
}

impl FrameArena {
    fn stage(&mut self, stage: Stage) -> &mut Vec<Staged> {
        &mut self.stages[stage as usize]
    }

    /// Number of triangles that reached a stage in the last frame
    pub fn stage_len(&self, stage: Stage) -> usize {
        self.stages[stage as usize].len()
    }

    fn clear(&mut self) {
        for stage in &mut self.stages {
            stage.clear();
        }
        self.lit.clear();
        self.order.clear();
    }
}

/// Project a view-space point to the screen.
/// Returns the screen point and whether it lies inside the clip cube.
pub fn project_point(view: Vec3, projection: &Mat4, viewport: Viewport) -> (Vec3, bool) {
    let mut p = view.transform(projection);

    // Behind or on the eye plane the point is left unnormalized
    if p.w > EPSILON {
        if let Ok(divided) = p.checked_div(p.w) {
            p = divided;
        }
    }

    let inside = p.x.abs() <= 1.0 && p.y.abs() <= 1.0 && p.z.abs() <= 1.0;

    let screen = Vec3 {
        x: (p.x + 1.0) * 0.5 * viewport.width as f32,
        y: (-p.y + 1.0) * 0.5 * viewport.height as f32,
        z: p.z,
        w: p.w,
    };
    (screen, inside)
}

pub struct TransformPipeline {
    pub settings: PipelineSettings,
    arena: FrameArena,
    frame: Frame,
}

impl TransformPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            settings,
            arena: FrameArena::default(),
            frame: Frame::default(),
        }
    }

    pub fn world_matrix(&self, rotation: &WorldRotation) -> Mat4 {
        let mut world = Mat4::identity();
        if rotation.x {
            world = world.mul(&Mat4::rotation_x(rotation.angle));
        }
        if rotation.y {
            world = world.mul(&Mat4::rotation_y(rotation.angle));
        }
        if rotation.z {
            world = world.mul(&Mat4::rotation_z(rotation.angle));
        }
        world.mul(&Mat4::translation(0.0, 0.0, self.settings.world_offset))
    }

    pub fn projection_matrix(&self, fov: f32, viewport: Viewport) -> Mat4 {
        Mat4::perspective(fov, viewport.aspect(), self.settings.z_near, self.settings.z_far)
    }

    pub fn arena(&self) -> &FrameArena {
        &self.arena
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Transform `mesh` into screen-space triangles, back to front
    pub fn run(
        &mut self,
        mesh: &Mesh,
        camera: &Camera,
        rotation: &WorldRotation,
        viewport: Viewport,
    ) -> &Frame {
        self.arena.clear();
        self.frame.clear();

        let world = self.world_matrix(rotation);
        let view = camera.view_matrix();
        let projection = self.projection_matrix(camera.fov, viewport);

        self.to_world(mesh, camera.position, &world);
        self.to_view(&view);
        self.to_screen(&projection, viewport);
        self.emit(mesh);

        log::trace!(
            "pipeline: {} in, {} lit, {} on screen",
            mesh.len(),
            self.arena.stage_len(Stage::World),
            self.frame.len()
        );
        &self.frame
    }

    /// Object -> world, back-face cull, lighting
    fn to_world(&mut self, mesh: &Mesh, eye: Vec3, world: &Mat4) {
        let light = self.settings.light;

        for (source, triangle) in mesh.triangles.iter().enumerate() {
            let points = (*triangle.vertices()).map(|v| v.transform(world));

            let normal = face_normal(&points);

            // Front faces point back at the camera
            if normal.dot(points[0] - eye) > 0.0 {
                continue;
            }

            let shading = points.map(|p| light.intensity(normal, p));
            let centroid = (points[0] + points[1] + points[2]) * (1.0 / 3.0);
            let luminance = light.intensity(normal, centroid);

            let slot = self.arena.lit.len();
            self.arena.lit.push(Lit { source, shading, luminance });
            self.arena.stage(Stage::World).push(Staged { points, slot });
        }
    }

    /// World -> view
    fn to_view(&mut self, view: &Mat4) {
        let [world, viewed, _] = &mut self.arena.stages;
        viewed.extend(world.iter().map(|t| Staged {
            points: t.points.map(|p| p.transform(view)),
            slot: t.slot,
        }));
    }

    /// View -> clip -> screen with the partial-clip heuristic
    fn to_screen(&mut self, projection: &Mat4, viewport: Viewport) {
        let [_, viewed, projected] = &mut self.arena.stages;

        for t in viewed.iter() {
            let mut outside = 0;
            let points = t.points.map(|p| {
                let (screen, inside) = project_point(p, projection, viewport);
                if !inside {
                    outside += 1;
                }
                screen
            });

            // Dropped only when every vertex is out of range; partly visible
            // triangles are kept whole.
            if outside < 3 {
                projected.push(Staged { points, slot: t.slot });
            }
        }
    }

    /// Sort back to front by mean view-space z and fill the frame
    fn emit(&mut self, mesh: &Mesh) {
        let arena = &mut self.arena;
        let viewed = &arena.stages[Stage::View as usize];
        let projected = &arena.stages[Stage::Projected as usize];

        let depth = |i: usize| {
            let p = viewed[projected[i].slot].points;
            (p[0].z + p[1].z + p[2].z) / 3.0
        };

        arena.order.extend(0..projected.len());
        // Stable, so equal depths keep mesh order
        arena.order.sort_by(|&a, &b| depth(b).total_cmp(&depth(a)));

        for &i in &arena.order {
            let staged = projected[i];
            let lit = arena.lit[staged.slot];
            self.frame.triangles.push(ScreenTriangle {
                points: staged.points,
                color: mesh.triangles[lit.source].color,
                luminance: lit.luminance,
                depth: depth(i),
            });
            self.frame.shading.push(lit.shading);
        }
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new(PipelineSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Triangle;
    use approx::assert_abs_diff_eq;

    const VIEWPORT: Viewport = Viewport { width: 800, height: 600 };

    fn mesh_of(triangles: &[[Vec3; 3]]) -> Mesh {
        let mut mesh = Mesh::new("test");
        for t in triangles {
            mesh.add_triangle(Triangle::new(*t).unwrap());
        }
        mesh
    }

    fn unshifted() -> TransformPipeline {
        TransformPipeline::new(PipelineSettings { world_offset: 0.0, ..Default::default() })
    }

    #[test]
    fn test_view_axis_maps_to_screen_centre() {
        let pipeline = unshifted();
        let projection = pipeline.projection_matrix(70.0, VIEWPORT);
        for d in [0.5, 5.0, 250.0] {
            let (screen, inside) = project_point(Vec3::new(0.0, 0.0, d), &projection, VIEWPORT);
            assert!(inside);
            assert_abs_diff_eq!(screen.x, 400.0, epsilon = 1e-3);
            assert_abs_diff_eq!(screen.y, 300.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_points_behind_eye_are_not_divided() {
        let pipeline = unshifted();
        let projection = pipeline.projection_matrix(70.0, VIEWPORT);

        for view in [Vec3::new(1.0, 2.0, -2.0), Vec3::new(0.5, -0.5, 0.0)] {
            let clip = view.transform(&projection);
            let (screen, _) = project_point(view, &projection, VIEWPORT);
            assert_abs_diff_eq!(screen.w, view.z, epsilon = 1e-6);
            assert_abs_diff_eq!(screen.w, clip.w, epsilon = 1e-6);
            assert_abs_diff_eq!(screen.x, (clip.x + 1.0) * 400.0, epsilon = 1e-3);
            assert_abs_diff_eq!(screen.y, (1.0 - clip.y) * 300.0, epsilon = 1e-3);
            assert_abs_diff_eq!(screen.z, clip.z, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_triangle_reaching_behind_eye_is_kept_whole() {
        // Two vertices in front of the camera, one behind it
        let mesh = mesh_of(&[[
            Vec3::new(-1.0, -1.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
            Vec3::new(1.0, -1.0, -2.0),
        ]]);
        let mut pipeline = unshifted();
        let frame = pipeline.run(&mesh, &Camera::default(), &WorldRotation::default(), VIEWPORT);
        assert_eq!(frame.len(), 1);

        let [a, b, behind] = frame.triangles[0].points;
        assert_abs_diff_eq!(a.w, 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(b.w, 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(behind.w, -2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_single_triangle_end_to_end() {
        // Wound clockwise as seen from the camera, so it faces it
        let mesh = mesh_of(&[[
            Vec3::new(-1.0, -1.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
            Vec3::new(1.0, -1.0, 5.0),
        ]]);
        let mut camera = Camera::default();
        camera.fov = 90.0;

        let mut pipeline = unshifted();
        let frame = pipeline.run(&mesh, &camera, &WorldRotation::default(), VIEWPORT);
        assert_eq!(frame.len(), 1);

        // x = (0.75 * x / z + 1) * 400, y = (1 - y / z) * 300
        let [left, top, right] = frame.triangles[0].points;
        assert_abs_diff_eq!(left.x, 340.0, epsilon = 1.0);
        assert_abs_diff_eq!(left.y, 360.0, epsilon = 1.0);
        assert_abs_diff_eq!(top.x, 400.0, epsilon = 1.0);
        assert_abs_diff_eq!(top.y, 240.0, epsilon = 1.0);
        assert_abs_diff_eq!(right.x, 460.0, epsilon = 1.0);
        assert_abs_diff_eq!(right.y, 360.0, epsilon = 1.0);
        assert!(left.x < top.x && top.x < right.x);
        assert_abs_diff_eq!(frame.triangles[0].depth, 5.0, epsilon = 1e-4);
    }

    #[test]
    fn test_back_faces_are_culled() {
        // Counter-clockwise from the camera: normal points away
        let mesh = mesh_of(&[[
            Vec3::new(-1.0, -1.0, 5.0),
            Vec3::new(1.0, -1.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
        ]]);
        let mut pipeline = unshifted();
        let frame = pipeline.run(&mesh, &Camera::default(), &WorldRotation::default(), VIEWPORT);
        assert!(frame.is_empty());
        assert_eq!(pipeline.arena().stage_len(Stage::World), 0);
    }

    #[test]
    fn test_cube_shows_only_front_faces() {
        let mut pipeline = TransformPipeline::default();
        let frame = pipeline.run(&Mesh::cube(), &Camera::default(), &WorldRotation::default(), VIEWPORT);
        // Straight on, only the two triangles of the near (south) face survive
        assert_eq!(frame.len(), 2);
        for t in &frame.triangles {
            assert_abs_diff_eq!(t.depth, 2.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_partial_clip_keeps_triangle_with_one_visible_vertex() {
        let mesh = mesh_of(&[
            // One vertex on screen, two far off to the right
            [Vec3::new(0.0, 0.0, 5.0), Vec3::new(50.0, 1.0, 5.0), Vec3::new(50.0, -1.0, 5.0)],
            // Entirely off to the left
            [Vec3::new(-60.0, 0.0, 5.0), Vec3::new(-50.0, 1.0, 5.0), Vec3::new(-50.0, -1.0, 5.0)],
        ]);
        let mut pipeline = unshifted();
        let frame = pipeline.run(&mesh, &Camera::default(), &WorldRotation::default(), VIEWPORT);
        assert_eq!(frame.len(), 1);
        assert!(frame.triangles[0].points[1].x > VIEWPORT.width as f32);
        assert_eq!(pipeline.arena().stage_len(Stage::View), 2);
    }

    #[test]
    fn test_sorted_back_to_front() {
        let near = [Vec3::new(-1.0, -1.0, 4.0), Vec3::new(0.0, 1.0, 4.0), Vec3::new(1.0, -1.0, 4.0)];
        let far = [Vec3::new(-1.0, -1.0, 9.0), Vec3::new(0.0, 1.0, 9.0), Vec3::new(1.0, -1.0, 9.0)];
        let mesh = mesh_of(&[near, far]);
        let mut pipeline = unshifted();
        let frame = pipeline.run(&mesh, &Camera::default(), &WorldRotation::default(), VIEWPORT);
        assert_eq!(frame.len(), 2);
        assert!(frame.triangles[0].depth > frame.triangles[1].depth);
        assert_abs_diff_eq!(frame.triangles[0].depth, 9.0, epsilon = 1e-4);
    }

    #[test]
    fn test_lighting_is_per_vertex_and_parallel() {
        let mesh = mesh_of(&[[
            Vec3::new(-1.0, -1.0, 5.0),
            Vec3::new(0.0, 1.0, 5.0),
            Vec3::new(1.0, -1.0, 5.0),
        ]]);
        let mut pipeline = TransformPipeline::new(PipelineSettings {
            world_offset: 0.0,
            light: Light::Directional(Vec3::new(0.0, 0.0, -1.0)),
            ..Default::default()
        });
        let frame = pipeline.run(&mesh, &Camera::default(), &WorldRotation::default(), VIEWPORT);
        assert_eq!(frame.shading.len(), frame.triangles.len());
        for i in frame.shading[0] {
            assert_abs_diff_eq!(i, 1.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(frame.triangles[0].luminance, 1.0, epsilon = 1e-6);

        // Light from behind the face gives zero, never negative
        pipeline.settings.light = Light::Directional(Vec3::new(0.0, 0.0, 1.0));
        let frame = pipeline.run(&mesh, &Camera::default(), &WorldRotation::default(), VIEWPORT);
        assert_eq!(frame.shading[0], [0.0; 3]);
    }

    #[test]
    fn test_identical_state_gives_identical_frames() {
        let mut pipeline = TransformPipeline::default();
        let mut camera = Camera::default();
        camera.position = Vec3::new(0.3, -0.2, -1.0);
        camera.yaw = 0.2;
        let rotation = WorldRotation { x: true, y: true, z: false, angle: 0.7 };

        let first = pipeline.run(&Mesh::cube(), &camera, &rotation, VIEWPORT).clone();
        let second = pipeline.run(&Mesh::cube(), &camera, &rotation, VIEWPORT).clone();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_world_matrix_pushes_along_z() {
        let pipeline = TransformPipeline::default();
        let p = Vec3::ZERO.transform(&pipeline.world_matrix(&WorldRotation::default()));
        assert_abs_diff_eq!(p.z, 3.0);
    }
}
