//! View frustum for culling

use crate::core::types::{Vec3, Vec4, Mat4};
use super::sphere::BoundingSphere;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// Packed as `normal.xyz, distance` for GPU upload
    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(self.distance)
    }
}

/// View frustum with 6 planes (Near, Far, Left, Right, Top, Bottom), normals pointing inward
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    ///
    /// Expects a `[0, 1]` clip depth range (glam `perspective_rh`, wgpu/Vulkan
    /// convention), so the near plane is row 2 alone.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let row = |i: usize| Vec4::new(vp.x_axis[i], vp.y_axis[i], vp.z_axis[i], vp.w_axis[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Self::normalize_plane(r2),      // near
                Self::normalize_plane(r3 - r2), // far
                Self::normalize_plane(r3 + r0), // left
                Self::normalize_plane(r3 - r0), // right
                Self::normalize_plane(r3 - r1), // top
                Self::normalize_plane(r3 + r1), // bottom
            ],
        }
    }

    fn normalize_plane(plane: Vec4) -> Plane {
        let normal = plane.truncate();
        let len = normal.length();
        if len <= f32::EPSILON {
            // Degenerate matrix: an always-passing plane keeps culling conservative
            return Plane::new(Vec3::ZERO, f32::MAX);
        }
        Plane {
            normal: normal / len,
            distance: plane.w / len,
        }
    }

    /// Check if a sphere touches the frustum (conservative test)
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|p| p.distance_to_point(sphere.center) >= -sphere.radius)
    }

    /// Planes packed for the GPU in the same order as `planes`
    pub fn to_vec4_array(&self) -> [[f32; 4]; 6] {
        self.planes.map(|p| p.to_vec4().to_array())
    }
}
