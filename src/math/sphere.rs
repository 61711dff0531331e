//! Bounding sphere

use crate::core::types::{Mat4, Vec3};

/// Sphere used as the per-instance culling volume
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere after applying an affine transform.
    ///
    /// The radius is scaled by the largest axis scale so non-uniform scales
    /// stay conservative.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        let center = transform.transform_point3(self.center);
        let scale = transform.x_axis.truncate().length()
            .max(transform.y_axis.truncate().length())
            .max(transform.z_axis.truncate().length());
        Self {
            center,
            radius: self.radius * scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_moves_center_only() {
        let s = BoundingSphere::new(Vec3::new(0.0, 1.0, 0.0), 2.0);
        let t = s.transformed(&Mat4::from_translation(Vec3::new(5.0, 0.0, -3.0)));
        assert_eq!(t.center, Vec3::new(5.0, 1.0, -3.0));
        assert_eq!(t.radius, 2.0);
    }

    #[test]
    fn test_non_uniform_scale_uses_largest_axis() {
        let s = BoundingSphere::new(Vec3::ZERO, 1.0);
        let t = s.transformed(&Mat4::from_scale(Vec3::new(1.0, 4.0, 2.0)));
        assert!((t.radius - 4.0).abs() < 1e-6);
    }
}
