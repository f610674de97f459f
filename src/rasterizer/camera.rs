//! Free-flying camera: look direction from pitch/yaw, up vector from roll

use super::math::{Mat4, Vec3};
use crate::input::{Action, InputState};

pub const FOV_MIN: f32 = 1.0;
pub const FOV_MAX: f32 = 179.0;

/// Camera state
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub pitch: f32, // radians, about X
    pub yaw: f32,   // radians, about Y
    pub roll: f32,  // radians, about Z
    /// Field of view in degrees
    pub fov: f32,
    /// Distance moved per tick
    pub move_step: f32,
    /// Radians turned per tick
    pub turn_step: f32,
}

impl Camera {
    pub fn new(position: Vec3, fov: f32) -> Self {
        Self {
            position,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
            fov,
            move_step: 0.1,
            turn_step: 0.01,
        }
    }

    /// Unit vector the camera faces: (0,0,1) turned by pitch, then yaw
    pub fn look_dir(&self) -> Vec3 {
        let rotation = Mat4::rotation_x(-self.pitch).mul(&Mat4::rotation_y(-self.yaw));
        Vec3::FORWARD.transform(&rotation)
    }

    /// (0,1,0) rolled about the view axis
    pub fn up(&self) -> Vec3 {
        Vec3::UP.transform(&Mat4::rotation_z(-self.roll))
    }

    /// World-to-view matrix
    pub fn view_matrix(&self) -> Mat4 {
        let target = self.position + self.look_dir();
        // look_at is rigid, so the cheap inverse is exact here
        Mat4::look_at(self.position, target, self.up()).quick_inverse()
    }

    /// Move and turn according to the held actions
    pub fn apply_input(&mut self, input: &InputState) {
        let up = self.up();
        let forward = self.look_dir() * self.move_step;
        let right = up.cross(forward).normalize_or_self() * self.move_step;
        let lift = up.normalize_or_self() * self.move_step;

        let moves = [
            (Action::MoveUp, lift),
            (Action::MoveDown, -lift),
            (Action::MoveRight, right),
            (Action::MoveLeft, -right),
            (Action::MoveForward, forward),
            (Action::MoveBack, -forward),
        ];
        for (action, delta) in moves {
            if input.is_held(action) {
                self.position = self.position + delta;
            }
        }

        let turn = self.turn_step;
        if input.is_held(Action::YawLeft) {
            self.yaw -= turn;
        }
        if input.is_held(Action::YawRight) {
            self.yaw += turn;
        }
        if input.is_held(Action::PitchDown) {
            self.pitch -= turn;
        }
        if input.is_held(Action::PitchUp) {
            self.pitch += turn;
        }
        if input.is_held(Action::RollLeft) {
            self.roll -= turn;
        }
        if input.is_held(Action::RollRight) {
            self.roll += turn;
        }

        if input.is_held(Action::FovIncrease) && self.fov < FOV_MAX {
            self.fov = (self.fov + 1.0).min(FOV_MAX);
        }
        if input.is_held(Action::FovDecrease) && self.fov > FOV_MIN {
            self.fov = (self.fov - 1.0).max(FOV_MIN);
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 70.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_default_camera_looks_down_z() {
        let cam = Camera::default();
        let dir = cam.look_dir();
        assert_abs_diff_eq!(dir.z, 1.0, epsilon = 1e-6);
        assert!(cam.view_matrix().approx_eq(&Mat4::identity(), 1e-6));
    }

    #[test]
    fn test_forward_moves_along_look_dir() {
        let mut cam = Camera::default();
        cam.apply_input(&InputState::new().with_held(Action::MoveForward));
        assert_abs_diff_eq!(cam.position.z, 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(cam.position.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_right_is_positive_x() {
        let mut cam = Camera::default();
        cam.apply_input(&InputState::new().with_held(Action::MoveRight));
        assert_abs_diff_eq!(cam.position.x, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_fov_is_clamped() {
        let mut cam = Camera::new(Vec3::ZERO, 178.5);
        let wider = InputState::new().with_held(Action::FovIncrease);
        cam.apply_input(&wider);
        cam.apply_input(&wider);
        assert_abs_diff_eq!(cam.fov, FOV_MAX);

        cam.fov = 1.5;
        let narrower = InputState::new().with_held(Action::FovDecrease);
        cam.apply_input(&narrower);
        cam.apply_input(&narrower);
        assert_abs_diff_eq!(cam.fov, FOV_MIN);
    }

    #[test]
    fn test_yaw_turns_view() {
        let mut cam = Camera::default();
        cam.yaw = std::f32::consts::FRAC_PI_2;
        let dir = cam.look_dir();
        assert_abs_diff_eq!(dir.len(), 1.0, epsilon = 1e-6);
        assert!(dir.z.abs() < 1e-6);
    }
}
