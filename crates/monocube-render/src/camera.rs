//! Camera and view management.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Camera for rendering.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(2.0, 2.0, 2.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 4.0 / 3.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Set the aspect ratio.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
        // Vulkan clip space is y-down
        proj.y_axis.y *= -1.0;
        proj
    }

    /// Model-view-projection matrix for the given model transform.
    pub fn mvp(&self, model: Mat4) -> Mat4 {
        self.projection_matrix() * self.view_matrix() * model
    }

    /// Uniform data for the cube pass.
    pub fn uniforms(&self, model: Mat4) -> SceneUniforms {
        SceneUniforms {
            mvp: self.mvp(model).to_cols_array_2d(),
        }
    }
}

/// GPU uniform block for the cube pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneUniforms {
    pub mvp: [[f32; 4]; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn target_projects_to_screen_center() {
        let camera = Camera::default();
        let clip = camera.mvp(Mat4::IDENTITY) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let camera = Camera::default();
        let proj = camera.projection_matrix();
        assert!(proj.y_axis.y < 0.0);
    }

    #[test]
    fn uniforms_match_mvp() {
        let camera = Camera::default();
        let model = Mat4::from_rotation_y(0.5);
        let uniforms = camera.uniforms(model);
        let expected = camera.mvp(model).to_cols_array_2d();
        assert_eq!(uniforms.mvp, expected);
    }
}
