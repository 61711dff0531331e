//! Perspective camera used both for viewing and as the culling frustum source

use crate::core::types::{Vec3, Mat4, Quat};
use crate::math::Frustum;

/// Pitch limit (radians), keeps the view direction off the poles
const MAX_PITCH: f32 = 1.55;

/// Camera with position, yaw/pitch orientation, and projection parameters
#[derive(Clone, Debug)]
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// Rotation around world Y (azimuth), radians
    yaw: f32,
    /// Rotation around local X (zenith), radians
    pitch: f32,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
}

impl Camera {
    /// Create camera at `position` looking towards `target`
    pub fn look_at(position: Vec3, target: Vec3, aspect: f32, fov_y_degrees: f32, far: f32) -> Self {
        let mut camera = Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near: 0.1,
            far,
        };
        camera.face(target);
        camera
    }

    /// Turn the camera towards a point, keeping its position
    pub fn face(&mut self, target: Vec3) {
        let f = (target - self.position).normalize_or_zero();
        if f == Vec3::ZERO {
            return;
        }
        self.yaw = (-f.x).atan2(-f.z);
        self.pitch = f.y.clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Orientation quaternion
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(glam::EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    /// Get view matrix (world to camera space)
    pub fn view_matrix(&self) -> Mat4 {
        let rotation_matrix = Mat4::from_quat(self.rotation().conjugate());
        let translation_matrix = Mat4::from_translation(-self.position);
        rotation_matrix * translation_matrix
    }

    /// Get projection matrix (camera to clip space, depth in [0, 1])
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space frustum of this camera
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection())
    }

    /// Get forward direction (negative Z in camera space)
    pub fn forward(&self) -> Vec3 {
        self.rotation() * -Vec3::Z
    }

    /// Get right direction (positive X in camera space)
    pub fn right(&self) -> Vec3 {
        self.rotation() * Vec3::X
    }

    /// Get up direction (positive Y in camera space)
    pub fn up(&self) -> Vec3 {
        self.rotation() * Vec3::Y
    }

    pub fn azimuth(&self) -> f32 {
        self.yaw
    }

    pub fn zenith(&self) -> f32 {
        self.pitch
    }

    pub fn set_azimuth(&mut self, radians: f32) {
        self.yaw = radians;
    }

    pub fn set_zenith(&mut self, radians: f32) {
        self.pitch = radians.clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Rotate by yaw/pitch deltas (radians)
    pub fn rotate(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw += d_yaw;
        self.set_zenith(self.pitch + d_pitch);
    }

    /// Update aspect ratio (call on window resize)
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.aspect = width / height;
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 16.0 / 9.0, 45.0, 50.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directions() {
        let camera = Camera::default();

        // Default camera looks down -Z
        assert!((camera.forward().z - (-1.0)).abs() < 0.001);
        assert!((camera.right().x - 1.0).abs() < 0.001);
        assert!((camera.up().y - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_look_at_faces_target() {
        let camera = Camera::look_at(Vec3::new(-1.0, 3.0, -1.0), Vec3::new(1.0, 0.5, 1.0), 1.0, 45.0, 50.0);
        let expected = (Vec3::new(1.0, 0.5, 1.0) - Vec3::new(-1.0, 3.0, -1.0)).normalize();
        assert!(camera.forward().distance(expected) < 1e-4);
    }

    #[test]
    fn test_view_matrix_translation() {
        let mut camera = Camera::default();
        camera.position = Vec3::new(10.0, 0.0, 0.0);

        let view = camera.view_matrix();
        let origin_in_camera = view.transform_point3(Vec3::ZERO);
        assert!((origin_in_camera.x - (-10.0)).abs() < 0.001);
    }

    #[test]
    fn test_frustum_contains_target() {
        let camera = Camera::look_at(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, 1.0, 45.0, 40.0);
        let frustum = camera.frustum();
        let point = |center| crate::math::BoundingSphere::new(center, 0.0);
        assert!(frustum.intersects_sphere(&point(Vec3::ZERO)));
        assert!(!frustum.intersects_sphere(&point(Vec3::new(0.0, 2.0, 20.0))));
    }

    #[test]
    fn test_zenith_is_clamped() {
        let mut camera = Camera::default();
        camera.set_zenith(3.0);
        assert!(camera.zenith() <= MAX_PITCH);
        camera.rotate(0.0, -10.0);
        assert!(camera.zenith() >= -MAX_PITCH);
    }
}
