//! Axis-aligned bounding box

use crate::core::types::Vec3;
use super::sphere::BoundingSphere;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any `expand` call will snap onto
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Smallest box containing all points, `None` for an empty slice
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut aabb = Self::empty();
        for &p in points {
            aabb.expand(p);
        }
        Some(aabb)
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get half-extents
    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Sphere centered on the box that encloses all of its corners
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.center(), self.half_extent().length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let aabb = Aabb::from_points(&[
            Vec3::new(-1.0, 0.0, 2.0),
            Vec3::new(1.0, 3.0, -2.0),
            Vec3::ZERO,
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 2.0));
        assert_eq!(aabb.center(), Vec3::new(0.0, 1.5, 0.0));
    }

    #[test]
    fn test_from_no_points() {
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn test_bounding_sphere_encloses_corners() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let sphere = aabb.bounding_sphere();
        assert_eq!(sphere.center, Vec3::ZERO);
        assert!((sphere.radius - 3.0_f32.sqrt()).abs() < 1e-5);
    }
}
