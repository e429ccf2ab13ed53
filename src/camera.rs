//! Perspective camera with cached view and projection matrices.

use crate::math::{self, Mat4, Vec3};

/// Eye/target/up camera with a perspective projection. Matrices are
/// recomputed whenever a parameter changes, so the getters stay cheap.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    up: Vec3,

    fov: f32,
    aspect_ratio: f32,
    near_plane: f32,
    far_plane: f32,

    view_matrix: Mat4,
    proj_matrix: Mat4,
    view_proj_matrix: Mat4,
}

impl Default for Camera {
    fn default() -> Camera {
        Camera::new()
    }
}

impl Camera {
    pub fn new() -> Camera {
        let mut camera = Camera {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::zeros(),
            up: Vec3::y(),
            fov: 45f32.to_radians(),
            aspect_ratio: 16.0 / 9.0,
            near_plane: 0.1,
            far_plane: 100.0,
            view_matrix: Mat4::identity(),
            proj_matrix: Mat4::identity(),
            view_proj_matrix: Mat4::identity(),
        };
        camera.update_matrices();
        camera
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_matrices();
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.update_matrices();
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
        self.update_matrices();
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
        self.update_matrices();
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.update_matrices();
    }

    pub fn set_near_plane(&mut self, near_plane: f32) {
        self.near_plane = near_plane;
        self.update_matrices();
    }

    pub fn set_far_plane(&mut self, far_plane: f32) {
        self.far_plane = far_plane;
        self.update_matrices();
    }

    /// Configure the whole perspective projection at once.
    pub fn set_perspective(&mut self, fov: f32, aspect_ratio: f32, near_plane: f32, far_plane: f32) {
        self.fov = fov;
        self.aspect_ratio = aspect_ratio;
        self.near_plane = near_plane;
        self.far_plane = far_plane;
        self.update_matrices();
    }

    /// Place the camera and aim it in one step.
    pub fn look_at(&mut self, eye: Vec3, center: Vec3, up: Vec3) {
        self.position = eye;
        self.target = center;
        self.up = up;
        self.update_matrices();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(&self.up).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.up.normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.proj_matrix
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_proj_matrix
    }

    fn update_matrices(&mut self) {
        self.view_matrix = math::look_at(self.position, self.target, self.up);
        self.proj_matrix = math::perspective(self.fov, self.aspect_ratio, self.near_plane, self.far_plane);
        self.view_proj_matrix = self.proj_matrix * self.view_matrix;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn target_projects_to_the_screen_center() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::new(0.0, 2.0, 8.0), Vec3::new(0.0, 1.0, 0.0), Vec3::y());

        let t = camera.target();
        let clip = camera.view_projection_matrix() * Vec4::new(t.x, t.y, t.z, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn forward_points_at_the_target() {
        let mut camera = Camera::new();
        camera.look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        assert_relative_eq!(camera.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-6);
    }
}
